use std::{
    fmt,
    mem::ManuallyDrop,
    ptr,
    sync::atomic::{AtomicUsize, Ordering},
};
use crossbeam::epoch::{self, Atomic, Owned};


struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

/// Lock-free стек переиспользуемых значений (стек Трайбера).
///
/// Вершина меняется только через compare-and-swap. Снятые узлы освобождаются
/// отложенно через epoch GC из crossbeam: пока хоть один поток может видеть
/// узел, его память не переиспользуется, так что ABA на освобождённом адресе
/// невозможен.
///
/// LIFO гарантирован только при доступе из одного потока. При конкуренции
/// гарантируется лишь сохранение мультимножества значений.
pub struct ResourcePool<T> {
    top: Atomic<Node<T>>,
    len: AtomicUsize,
}

// SAFETY: значение переходит между потоками только целиком (push/pop),
// ссылки на `value` другим потокам не выдаются, поэтому достаточно `T: Send`.
unsafe impl<T: Send> Send for ResourcePool<T> {}
unsafe impl<T: Send> Sync for ResourcePool<T> {}

impl<T> ResourcePool<T> {
    pub fn new() -> Self {
        Self {
            top: Atomic::null(),
            len: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        });
        // считаем заранее, чтобы pop никогда не увёл счётчик ниже нуля
        self.len.fetch_add(1, Ordering::Relaxed);

        let guard = epoch::pin();
        loop {
            let top = self.top.load(Ordering::Acquire, &guard);
            node.next.store(top, Ordering::Relaxed);
            match self
                .top
                .compare_exchange(top, node, Ordering::Release, Ordering::Relaxed, &guard)
            {
                Ok(_) => break,
                Err(e) => node = e.new,
            }
        }
    }

    /// `None` - пул пуст, это не ошибка
    pub fn pop(&self) -> Option<T> {
        let guard = epoch::pin();
        loop {
            let top = self.top.load(Ordering::Acquire, &guard);
            // SAFETY: guard держит эпоху, узел не освободят, пока мы на него смотрим
            let node = unsafe { top.as_ref() }?;
            let next = node.next.load(Ordering::Acquire, &guard);

            if self
                .top
                .compare_exchange(top, next, Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: CAS выиграл только этот поток, значит значение забираем
                // ровно один раз. Узел больше недостижим из вершины, а `ManuallyDrop`
                // не даст деструктору узла уронить значение повторно.
                unsafe {
                    let value = ManuallyDrop::into_inner(ptr::read(&node.value));
                    guard.defer_destroy(top);
                    return Some(value);
                }
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.top.load(Ordering::Acquire, &guard).is_null()
    }

    /// Приблизительный размер: при конкурентных push может быть завышен
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

impl<T> Default for ResourcePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ResourcePool<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool").field("len", &self.len()).finish()
    }
}
