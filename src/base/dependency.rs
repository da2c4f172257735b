//! Dependency handles
//!
//! A wrapper (limiting reader, codec, record reader) refers to the object it
//! wraps through a `Dependency`: either owned inline, owned in a box, or
//! borrowed. Owning wrappers close what they own when they are closed.
//!
//! `StableDependency` never stores the object inline, so its address does
//! not change when the handle moves. Its default value is empty and does not
//! allocate.

use std::ops::{Deref, DerefMut};

/// Owned, boxed or borrowed handle to a wrapped object
#[derive(Debug)]
pub enum Dependency<'a, T> {
    Owned(T),
    Boxed(Box<T>),
    Borrowed(&'a mut T),
}

impl<'a, T> Dependency<'a, T> {
    pub fn owned(value: T) -> Self {
        Dependency::Owned(value)
    }

    pub fn boxed(value: Box<T>) -> Self {
        Dependency::Boxed(value)
    }

    pub fn borrowed(value: &'a mut T) -> Self {
        Dependency::Borrowed(value)
    }

    /// True if closing the wrapper must close the wrapped object.
    pub fn is_owning(&self) -> bool {
        !matches!(self, Dependency::Borrowed(_))
    }

    /// True if the wrapped object does not move with the handle.
    pub fn is_stable(&self) -> bool {
        !matches!(self, Dependency::Owned(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Dependency::Owned(value) => value,
            Dependency::Boxed(value) => value,
            Dependency::Borrowed(value) => value,
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        match self {
            Dependency::Owned(value) => value,
            Dependency::Boxed(value) => value,
            Dependency::Borrowed(value) => value,
        }
    }

    /// Returns the object if it is owned.
    pub fn into_owned(self) -> Option<T> {
        match self {
            Dependency::Owned(value) => Some(value),
            Dependency::Boxed(value) => Some(*value),
            Dependency::Borrowed(_) => None,
        }
    }
}

impl<T> Deref for Dependency<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T> DerefMut for Dependency<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut()
    }
}

/// Handle whose object keeps a fixed address
#[derive(Debug, Default)]
pub enum StableDependency<'a, T> {
    #[default]
    Empty,
    Boxed(Box<T>),
    Borrowed(&'a mut T),
}

impl<'a, T> StableDependency<'a, T> {
    pub fn new(value: T) -> Self {
        StableDependency::Boxed(Box::new(value))
    }

    pub fn borrowed(value: &'a mut T) -> Self {
        StableDependency::Borrowed(value)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, StableDependency::Empty)
    }

    pub fn is_owning(&self) -> bool {
        matches!(self, StableDependency::Boxed(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            StableDependency::Empty => None,
            StableDependency::Boxed(value) => Some(value),
            StableDependency::Borrowed(value) => Some(value),
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            StableDependency::Empty => None,
            StableDependency::Boxed(value) => Some(value),
            StableDependency::Borrowed(value) => Some(value),
        }
    }

    /// Allocates the object on first use.
    pub fn get_or_insert_with(&mut self, create: impl FnOnce() -> T) -> &mut T {
        if self.is_empty() {
            *self = StableDependency::Boxed(Box::new(create()));
        }
        match self {
            StableDependency::Boxed(value) => value,
            StableDependency::Borrowed(value) => value,
            StableDependency::Empty => unreachable!("filled above"),
        }
    }

    /// Releases the object, leaving the handle empty.
    pub fn reset(&mut self) {
        *self = StableDependency::Empty;
    }
}

impl<'a, T> From<Dependency<'a, T>> for StableDependency<'a, T> {
    fn from(dependency: Dependency<'a, T>) -> Self {
        match dependency {
            Dependency::Owned(value) => StableDependency::Boxed(Box::new(value)),
            Dependency::Boxed(value) => StableDependency::Boxed(value),
            Dependency::Borrowed(value) => StableDependency::Borrowed(value),
        }
    }
}
