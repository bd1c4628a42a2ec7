use std::{
    any::type_name,
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
};

use log::trace;

use crate::{
    access::{Reading, Writing},
    block::ControlBlock,
    error::{AccessError, UninitializedAccess},
    stats,
};

/// What `Handle::type_name` reports for an empty handle.
pub const NULL_TYPE_NAME: &str = "Null";

/// Shared ownership of one heap object.
///
/// Cloning a populated handle adds one to the count kept in the object's
/// control block; dropping one takes one away, and the last one out drops the
/// object. A handle can also be empty, in which case it owns nothing and every
/// access fails with `UninitializedAccess`.
///
/// `T` is the *view* this handle has of the object. It starts out as the type
/// the object was made as and can be changed with `cast`, which keeps sharing
/// the same control block.
///
/// The count is not atomic: `Handle` is neither `Send` nor `Sync`.
pub struct Handle<T: ?Sized + 'static>
{
    shared: Option<Shared<T>>,
    _owns: PhantomData<T>,
}

struct Shared<T: ?Sized>
{
    block: NonNull<ControlBlock>,
    view: NonNull<T>,
}

impl<T: ?Sized> Clone for Shared<T>
{
    fn clone(&self) -> Self { *self }
}
impl<T: ?Sized> Copy for Shared<T> {}

impl<T: 'static> Handle<T>
{
    /// Move `it` to the heap under a fresh control block with a count of one.
    pub fn new(it: T) -> Self { Self::from(Box::new(it)) }

    /// Build the object in place from `make`.
    pub fn new_with(make: impl FnOnce() -> T) -> Self { Self::new(make()) }

    /// A handle to a default-constructed object.
    pub fn new_default() -> Self
    where
        T: Default,
    {
        Self::new(T::default())
    }

    /// A handle to a copy of `it`. The copy is not shared with `it`.
    pub fn from_value(it: &T) -> Self
    where
        T: Clone,
    {
        Self::new(it.clone())
    }

    /// A copy of the object.
    pub fn get(&self) -> Result<T, AccessError>
    where
        T: Clone,
    {
        Ok(T::clone(&*self.read()?))
    }

    /// Take the object out if this is the only handle to it and `T` is its
    /// dynamic type. Gives the handle back otherwise.
    pub fn try_into_inner(self) -> Result<T, Self>
    {
        if !self.is_unique() || !self.is_type::<T>() {
            return Err(self);
        }
        let Some(shared) = self.shared else {
            return Err(self);
        };
        mem::forget(self);
        Ok(unsafe { ControlBlock::into_inner::<T>(shared.block) })
    }
}

impl<T: ?Sized + 'static> Handle<T>
{
    /// A handle that owns nothing.
    pub const fn empty() -> Self
    {
        Handle {
            shared: None,
            _owns: PhantomData,
        }
    }

    fn from_shared(block: NonNull<ControlBlock>, view: NonNull<T>) -> Self
    {
        Handle {
            shared: Some(Shared { block, view }),
            _owns: PhantomData,
        }
    }

    fn block(&self) -> Option<&ControlBlock>
    {
        self.shared
            .as_ref()
            .map(|s| unsafe { s.block.as_ref() })
    }

    // One block per object, and unlike the object it is never zero-sized.
    fn identity(&self) -> Option<NonNull<ControlBlock>> { self.shared.map(|s| s.block) }

    pub fn is_populated(&self) -> bool { self.shared.is_some() }

    pub fn is_empty(&self) -> bool { self.shared.is_none() }

    /// Number of live handles, of any view type, sharing this object. Zero for
    /// an empty handle.
    pub fn ref_count(&self) -> usize { self.block().map_or(0, ControlBlock::count) }

    pub fn is_unique(&self) -> bool { self.ref_count() == 1 }

    /// Name of the type the object was made as, regardless of the view.
    pub fn type_name(&self) -> &'static str
    {
        self.block().map_or(NULL_TYPE_NAME, ControlBlock::class_name)
    }

    /// Printable address of the object, for debugging and identity checks.
    ///
    /// Zero-sized objects have no address of their own, so for those the
    /// control block's address is printed instead.
    pub fn address(&self) -> String
    {
        let ptr = match self.shared {
            None => ptr::null(),
            Some(shared) => {
                let block = unsafe { shared.block.as_ref() };
                if block.is_zero_sized() {
                    shared.block.as_ptr() as *const ()
                } else {
                    block.object().as_ptr() as *const ()
                }
            }
        };
        format!("{:p}", ptr)
    }

    /// Pointer to the viewed object. Only valid while some handle keeps it
    /// alive.
    pub fn as_ptr(&self) -> Option<NonNull<T>> { self.shared.map(|s| s.view) }

    /// Pointer to the object viewed as a `U`, without taking a count. `None` if
    /// the handle is empty or there is no `U` view.
    pub fn view_ptr<U: ?Sized + 'static>(&self) -> Option<NonNull<U>>
    {
        self.block()?.view::<U>()
    }

    /// Whether both handles are populated, share one object and view it at the
    /// same address.
    pub fn ptr_eq(&self, other: &Self) -> bool
    {
        match (self.shared, other.shared) {
            (Some(a), Some(b)) => {
                a.block == b.block && a.view.cast::<()>() == b.view.cast::<()>()
            }
            _ => false,
        }
    }

    /// Shared access to the object.
    pub fn read(&self) -> Result<Reading<'_, T>, AccessError>
    {
        let shared = self.shared.as_ref().ok_or(UninitializedAccess)?;
        let block = unsafe { shared.block.as_ref() };
        if block.try_lock_shared() {
            Ok(unsafe { Reading::new(block, shared.view) })
        } else {
            Err(AccessError::Borrowed {
                held: block.borrow_state(),
            })
        }
    }

    /// Exclusive access to the object. Changes are seen through every handle
    /// sharing it.
    pub fn write(&self) -> Result<Writing<'_, T>, AccessError>
    {
        let shared = self.shared.as_ref().ok_or(UninitializedAccess)?;
        let block = unsafe { shared.block.as_ref() };
        if block.try_lock_exclusive() {
            Ok(unsafe { Writing::new(block, shared.view) })
        } else {
            Err(AccessError::Borrowed {
                held: block.borrow_state(),
            })
        }
    }

    /// Move the binding out, leaving this handle empty. The count is not
    /// touched.
    pub fn take(&mut self) -> Self
    {
        Handle {
            shared: self.shared.take(),
            _owns: PhantomData,
        }
    }

    /// Release the binding and leave this handle empty.
    pub fn clear(&mut self) { drop(self.take()) }

    pub fn swap(&mut self, other: &mut Self) { mem::swap(&mut self.shared, &mut other.shared) }

    /// Whether the object was made as a `U`.
    pub fn is_type<U: ?Sized + 'static>(&self) -> bool
    {
        self.block().is_some_and(ControlBlock::is::<U>)
    }

    /// Whether `cast::<U>()` would produce a populated handle.
    pub fn can_cast<U: ?Sized + 'static>(&self) -> bool
    {
        self.block().is_some_and(ControlBlock::can_view::<U>)
    }

    /// Another handle to the same object, viewed as a `U`.
    ///
    /// On success the shared count goes up by one. If this handle is empty, or
    /// the object's dynamic type has no `U` view, the result is empty and the
    /// count is left alone.
    pub fn cast<U: ?Sized + 'static>(&self) -> Handle<U>
    {
        let Some(shared) = self.shared else {
            return Handle::empty();
        };
        let block = unsafe { shared.block.as_ref() };
        match block.view::<U>() {
            Some(view) => {
                block.retain();
                stats::cast(true);
                Handle::from_shared(shared.block, view)
            }
            None => {
                stats::cast(false);
                trace!("no view of {} as {}", block.class_name(), type_name::<U>());
                Handle::empty()
            }
        }
    }

    /// Like `cast`, but hands this handle's own count over to the result. Gives
    /// the handle back untouched if there is no `U` view.
    pub fn try_into_cast<U: ?Sized + 'static>(self) -> Result<Handle<U>, Self>
    {
        let Some(shared) = self.shared else {
            return Err(self);
        };
        let block = unsafe { shared.block.as_ref() };
        match block.view::<U>() {
            Some(view) => {
                mem::forget(self);
                stats::cast(true);
                Ok(Handle::from_shared(shared.block, view))
            }
            None => {
                stats::cast(false);
                trace!("no view of {} as {}", block.class_name(), type_name::<U>());
                Err(self)
            }
        }
    }
}

impl<T: ?Sized + 'static> Drop for Handle<T>
{
    fn drop(&mut self)
    {
        if let Some(shared) = self.shared.take() {
            unsafe {
                ControlBlock::release(shared.block);
            }
        }
    }
}

impl<T: ?Sized + 'static> Clone for Handle<T>
{
    fn clone(&self) -> Self
    {
        if let Some(block) = self.block() {
            block.retain();
        }
        Handle {
            shared: self.shared,
            _owns: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self)
    {
        if !self.ptr_eq(source) {
            *self = source.clone();
        }
    }
}

impl<T: ?Sized + 'static> Default for Handle<T>
{
    fn default() -> Self { Self::empty() }
}

impl<T: 'static> From<Box<T>> for Handle<T>
{
    fn from(it: Box<T>) -> Self
    {
        let block = ControlBlock::allocate(it);
        let view = unsafe { block.as_ref() }.object().cast::<T>();
        Self::from_shared(block, view)
    }
}

impl<T: 'static> From<T> for Handle<T>
{
    fn from(it: T) -> Self { Self::new(it) }
}

impl<T: ?Sized + 'static, U: ?Sized + 'static> PartialEq<Handle<U>> for Handle<T>
{
    fn eq(&self, other: &Handle<U>) -> bool { self.identity() == other.identity() }
}

impl<T: ?Sized + 'static> Eq for Handle<T> {}

impl<T: ?Sized + 'static> PartialOrd for Handle<T>
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl<T: ?Sized + 'static> Ord for Handle<T>
{
    fn cmp(&self, other: &Self) -> Ordering { self.identity().cmp(&other.identity()) }
}

impl<T: ?Sized + 'static> Hash for Handle<T>
{
    fn hash<H: Hasher>(&self, state: &mut H) { self.identity().hash(state) }
}

/// Compares the viewed address. Distinct zero-sized objects share one
/// address, so for them this cannot tell objects apart; compare handles
/// instead.
impl<T: ?Sized + 'static> PartialEq<NonNull<T>> for Handle<T>
{
    fn eq(&self, other: &NonNull<T>) -> bool
    {
        self.as_ptr().map(NonNull::cast::<()>) == Some(other.cast::<()>())
    }
}

impl<T: ?Sized + 'static> PartialOrd<NonNull<T>> for Handle<T>
{
    fn partial_cmp(&self, other: &NonNull<T>) -> Option<Ordering>
    {
        Some(self.as_ptr().map(NonNull::cast::<()>).cmp(&Some(other.cast::<()>())))
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Handle<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Handle")
            .field("type", &self.type_name())
            .field("count", &self.ref_count())
            .field("address", &self.address())
            .finish()
    }
}

impl<T: ?Sized + 'static> fmt::Pointer for Handle<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.address()) }
}
