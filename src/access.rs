use std::{
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use crate::block::ControlBlock;

/// Shared access to an object obtained through `Handle::read`.
///
/// Any number of these may be alive for one object, across all handles to it,
/// as long as there is no `Writing`.
pub struct Reading<'a, T: ?Sized + 'a>
{
    block: &'a ControlBlock,
    value: NonNull<T>,
    _phantom: PhantomData<&'a T>,
}

impl<'a, T: ?Sized + 'a> Reading<'a, T>
{
    /// The caller must hold a shared lock on `block` for this guard.
    pub(crate) unsafe fn new(block: &'a ControlBlock, value: NonNull<T>) -> Self
    {
        Reading {
            block,
            value,
            _phantom: PhantomData,
        }
    }
}

impl<'a, T: ?Sized + 'a> Deref for Reading<'a, T>
{
    type Target = T;

    fn deref(&self) -> &Self::Target { unsafe { self.value.as_ref() } }
}

impl<'a, T: ?Sized + 'a> Clone for Reading<'a, T>
{
    fn clone(&self) -> Self
    {
        if !self.block.try_lock_shared() {
            panic!("too many readers of one object")
        }
        Reading {
            block: self.block,
            value: self.value,
            _phantom: PhantomData,
        }
    }
}

impl<'a, T: ?Sized + 'a> Drop for Reading<'a, T>
{
    fn drop(&mut self) { unsafe { self.block.unlock_shared() } }
}

impl<'a, T: ?Sized + fmt::Debug + 'a> fmt::Debug for Reading<'a, T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(&**self, f) }
}

/// Exclusive access to an object obtained through `Handle::write`.
///
/// While it lives, every other `read` or `write` of the same object, through
/// any handle, fails with `AccessError::Borrowed`.
pub struct Writing<'a, T: ?Sized + 'a>
{
    block: &'a ControlBlock,
    value: NonNull<T>,
    _phantom: PhantomData<&'a mut T>,
}

impl<'a, T: ?Sized + 'a> Writing<'a, T>
{
    /// The caller must hold the exclusive lock on `block` for this guard.
    pub(crate) unsafe fn new(block: &'a ControlBlock, value: NonNull<T>) -> Self
    {
        Writing {
            block,
            value,
            _phantom: PhantomData,
        }
    }
}

impl<'a, T: ?Sized + 'a> Deref for Writing<'a, T>
{
    type Target = T;

    fn deref(&self) -> &Self::Target { unsafe { self.value.as_ref() } }
}

impl<'a, T: ?Sized + 'a> DerefMut for Writing<'a, T>
{
    fn deref_mut(&mut self) -> &mut Self::Target { unsafe { self.value.as_mut() } }
}

impl<'a, T: ?Sized + 'a> Drop for Writing<'a, T>
{
    fn drop(&mut self) { unsafe { self.block.unlock_exclusive() } }
}

impl<'a, T: ?Sized + fmt::Debug + 'a> fmt::Debug for Writing<'a, T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(&**self, f) }
}
