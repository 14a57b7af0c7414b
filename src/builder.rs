//! Typestate markers for builders with required parameters.

use std::marker::PhantomData;

/// A required builder field that has not been provided yet.
pub struct Unset<T> {
    _value: PhantomData<T>,
}

impl<T> Default for Unset<T> {
    fn default() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<T> Unset<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A required builder field that has been provided.
#[derive(Clone)]
pub struct Set<T> {
    value: T,
}

impl<T> Set<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
