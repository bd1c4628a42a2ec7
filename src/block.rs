use std::{
    any::{type_name, TypeId},
    cell::Cell,
    fmt, mem, process,
    ptr::NonNull,
};

use log::trace;

use crate::{error::BorrowState, registry, stats};

/// Dynamic type of an allocation, captured when the allocation is made.
#[derive(Clone, Copy)]
pub(crate) struct Class
{
    id: TypeId,
    name: &'static str,
    size: usize,
    dispose: unsafe fn(NonNull<()>),
}

impl Class
{
    fn of<T: 'static>() -> Self
    {
        Class {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            size: mem::size_of::<T>(),
            dispose: dispose::<T>,
        }
    }
}

unsafe fn dispose<T>(object: NonNull<()>) { drop(Box::from_raw(object.cast::<T>().as_ptr())) }

/// Per-allocation bookkeeping shared by every handle to one object, whatever
/// view type those handles have.
///
/// The object lives in its own box; the block only points at it. The count is a
/// plain `Cell`, so neither the block nor the handles may leave their thread.
pub(crate) struct ControlBlock
{
    strong: Cell<usize>,
    lock: Cell<isize>,
    object: NonNull<()>,
    class: Class,
}

impl ControlBlock
{
    /// Take ownership of `it` under a fresh block with a count of one.
    pub(crate) fn allocate<T: 'static>(it: Box<T>) -> NonNull<ControlBlock>
    {
        let object = NonNull::from(Box::leak(it)).cast::<()>();
        let block = NonNull::from(Box::leak(Box::new(ControlBlock {
            strong: Cell::new(1),
            lock: Cell::new(0),
            object,
            class: Class::of::<T>(),
        })));
        stats::allocated();
        trace!("allocated {} at {:p}", type_name::<T>(), object);
        block
    }

    pub(crate) fn count(&self) -> usize { self.strong.get() }

    pub(crate) fn retain(&self)
    {
        match self.strong.get().checked_add(1) {
            Some(n) => self.strong.set(n),
            None => process::abort(),
        }
    }

    /// Give up one count. When it was the last one, the object and the block
    /// are freed and `true` is returned.
    ///
    /// The caller must own one count of `this` and must not touch `this`
    /// afterwards.
    pub(crate) unsafe fn release(this: NonNull<Self>) -> bool
    {
        let block = this.as_ref();
        let remaining = block.strong.get() - 1;
        block.strong.set(remaining);
        if remaining != 0 {
            return false;
        }

        let Self { object, class, .. } = *Box::from_raw(this.as_ptr());
        trace!("freeing {} at {:p}", class.name, object);
        stats::freed();
        (class.dispose)(object);
        true
    }

    /// Free a uniquely owned block and hand back its object instead of
    /// dropping it.
    ///
    /// The count must be exactly one and the dynamic type must be `T`.
    pub(crate) unsafe fn into_inner<T: 'static>(this: NonNull<Self>) -> T
    {
        debug_assert_eq!(this.as_ref().count(), 1);
        debug_assert!(this.as_ref().is::<T>());
        let Self { object, .. } = *Box::from_raw(this.as_ptr());
        trace!("unwrapping {} at {:p}", type_name::<T>(), object);
        stats::freed();
        *Box::from_raw(object.cast::<T>().as_ptr())
    }

    pub(crate) fn object(&self) -> NonNull<()> { self.object }

    pub(crate) fn class_name(&self) -> &'static str { self.class.name }

    /// Zero-sized objects all share one dangling address.
    pub(crate) fn is_zero_sized(&self) -> bool { self.class.size == 0 }

    pub(crate) fn is<U: ?Sized + 'static>(&self) -> bool { self.class.id == TypeId::of::<U>() }

    /// Ask the runtime type facility for a `U` view of the object.
    pub(crate) fn view<U: ?Sized + 'static>(&self) -> Option<NonNull<U>>
    {
        if self.is::<U>() {
            let object: *const NonNull<()> = &self.object;
            // SAFETY: `U` is the sized type the object was allocated as, so
            // `NonNull<U>` is a thin pointer with the layout of `NonNull<()>`.
            return Some(unsafe { object.cast::<NonNull<U>>().read() });
        }
        let view = registry::lookup::<U>(self.class.id)?;
        // SAFETY: the registry only holds view functions registered for this
        // concrete type.
        Some(unsafe { view(self.object) })
    }

    pub(crate) fn can_view<U: ?Sized + 'static>(&self) -> bool
    {
        self.is::<U>() || registry::contains::<U>(self.class.id)
    }

    pub(crate) fn borrow_state(&self) -> BorrowState
    {
        match self.lock.get() {
            0 => BorrowState::Free,
            n if n < 0 => BorrowState::Writing,
            n => BorrowState::Reading(n as usize),
        }
    }

    pub(crate) fn try_lock_exclusive(&self) -> bool
    {
        if self.lock.get() == 0 {
            self.lock.set(-1);
            true
        } else {
            false
        }
    }

    pub(crate) fn try_lock_shared(&self) -> bool
    {
        let n = self.lock.get();
        if n >= 0 && n < isize::MAX {
            self.lock.set(n + 1);
            true
        } else {
            false
        }
    }

    pub(crate) unsafe fn unlock_exclusive(&self)
    {
        if self.lock.get() >= 1 {
            panic!("unlock_exclusive on share-locked control block");
        } else if self.lock.get() == 0 {
            panic!("unlock_exclusive on unlocked control block");
        }
        self.lock.set(0);
    }

    pub(crate) unsafe fn unlock_shared(&self)
    {
        if self.lock.get() < 0 {
            panic!("unlock_shared on exclusive-locked control block");
        } else if self.lock.get() == 0 {
            panic!("unlock_shared on unlocked control block");
        }
        self.lock.set(self.lock.get() - 1);
    }
}

impl fmt::Debug for ControlBlock
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ControlBlock")
            .field("strong", &self.strong.get())
            .field("lock", &self.borrow_state())
            .field("object", &self.object)
            .field("class", &self.class.name)
            .finish()
    }
}
