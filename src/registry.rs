//! The view registry: the runtime type facility behind `Handle::cast`.
//!
//! Rust has no class hierarchy to walk, so relatedness is declared instead.
//! An entry says "an object whose dynamic type is `S` can be seen as a `U`",
//! where `U` is usually a trait object such as `dyn Shape`. Entries are keyed
//! by the *dynamic* type, so a handle that has already been cast to one view
//! can still be cast to any other view of the same object, or back down to
//! the concrete type, which never needs an entry.
//!
//! With the `global` feature the registry is shared by the whole process;
//! without it every thread keeps its own.

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    ptr::NonNull,
};

use log::debug;

/// Converts a type-erased pointer to an object of some concrete type into a
/// pointer to a view of the same object.
pub type ViewFn<U> = unsafe fn(NonNull<()>) -> NonNull<U>;

#[derive(Default)]
struct ViewTable(HashMap<(TypeId, TypeId), Box<dyn Any + Send + Sync>>);

impl ViewTable
{
    fn insert<U: ?Sized + 'static>(&mut self, concrete: TypeId, view: ViewFn<U>) -> bool
    {
        self.0
            .insert((concrete, TypeId::of::<U>()), Box::new(view))
            .is_none()
    }

    fn get<U: ?Sized + 'static>(&self, concrete: TypeId) -> Option<ViewFn<U>>
    {
        self.0
            .get(&(concrete, TypeId::of::<U>()))?
            .downcast_ref::<ViewFn<U>>()
            .copied()
    }

    fn contains<U: ?Sized + 'static>(&self, concrete: TypeId) -> bool
    {
        self.0.contains_key(&(concrete, TypeId::of::<U>()))
    }
}

#[cfg(feature = "global")]
mod table
{
    use lazy_static::lazy_static;
    use parking_lot::RwLock;

    use super::ViewTable;

    lazy_static! {
        static ref VIEWS: RwLock<ViewTable> = RwLock::new(ViewTable::default());
    }

    pub(super) fn read<R>(f: impl FnOnce(&ViewTable) -> R) -> R { f(&VIEWS.read()) }

    pub(super) fn write<R>(f: impl FnOnce(&mut ViewTable) -> R) -> R { f(&mut VIEWS.write()) }
}

#[cfg(not(feature = "global"))]
mod table
{
    use std::cell::RefCell;

    use super::ViewTable;

    thread_local! {
        static VIEWS : RefCell<ViewTable> = RefCell::new(ViewTable::default());
    }

    pub(super) fn read<R>(f: impl FnOnce(&ViewTable) -> R) -> R { VIEWS.with_borrow(f) }

    pub(super) fn write<R>(f: impl FnOnce(&mut ViewTable) -> R) -> R { VIEWS.with_borrow_mut(f) }
}

/// Declare that objects of dynamic type `S` can be viewed as `U`.
///
/// Registering the same pair again replaces the earlier function.
///
/// # Safety
///
/// `view` is only ever called with a pointer to a live `S`. It must return a
/// pointer into that same allocation that is valid as a `U` for as long as the
/// `S` is alive. The [`relate!`](crate::relate) macro builds such functions
/// out of unsizing coercions and is the safe way in.
pub unsafe fn register_view<S: 'static, U: ?Sized + 'static>(view: ViewFn<U>)
{
    if table::write(|t| t.insert(TypeId::of::<S>(), view)) {
        debug!("registered view {} => {}", type_name::<S>(), type_name::<U>());
    }
}

/// Whether a handle to an `S` can be cast to a `U`.
pub fn is_related<S: 'static, U: ?Sized + 'static>() -> bool
{
    TypeId::of::<S>() == TypeId::of::<U>() || contains::<U>(TypeId::of::<S>())
}

pub(crate) fn lookup<U: ?Sized + 'static>(concrete: TypeId) -> Option<ViewFn<U>>
{
    table::read(|t| t.get::<U>(concrete))
}

pub(crate) fn contains<U: ?Sized + 'static>(concrete: TypeId) -> bool
{
    table::read(|t| t.contains::<U>(concrete))
}

/// Register the views a concrete type offers.
///
/// ```
/// use sharedptr::{relate, Handle};
///
/// trait Shape { fn area(&self) -> f64; }
/// trait Named { fn name(&self) -> String; }
///
/// struct Square(f64);
/// impl Shape for Square { fn area(&self) -> f64 { self.0 * self.0 } }
/// impl Named for Square { fn name(&self) -> String { "square".into() } }
///
/// relate!(Square => dyn Shape, dyn Named);
///
/// let square = Handle::new(Square(3.0));
/// let shape = square.cast::<dyn Shape>();
/// let named = shape.cast::<dyn Named>();
/// assert_eq!(shape.read().unwrap().area(), 9.0);
/// assert_eq!(named.read().unwrap().name(), "square");
/// assert_eq!(square.ref_count(), 3);
/// ```
///
/// Every listed view must be a type the concrete type coerces to, which the
/// compiler checks.
#[macro_export]
macro_rules! relate {
    ($concrete:ty => $($view:ty),+ $(,)?) => {
        $({
            unsafe fn view(object: ::std::ptr::NonNull<()>) -> ::std::ptr::NonNull<$view>
            {
                let object: ::std::ptr::NonNull<$concrete> = object.cast();
                object
            }
            // SAFETY: `view` only re-types a pointer to `$concrete` through an
            // unsizing coercion.
            unsafe { $crate::register_view::<$concrete, $view>(view) }
        })+
    };
}
