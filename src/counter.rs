use parking_lot::Mutex;


/// Счётчик под мьютексом. Любое чтение и запись только под блокировкой,
/// guard отпускает её на любом пути выхода
#[derive(Debug, Default)]
pub struct SharedCounter {
    value: Mutex<u64>,
}

impl SharedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Увеличивает на единицу и возвращает новое значение
    #[inline]
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    pub fn add(&self, delta: u64) -> u64 {
        let mut value = self.value.lock();
        *value += delta;
        *value
    }

    #[inline]
    pub fn value(&self) -> u64 {
        *self.value.lock()
    }
}
