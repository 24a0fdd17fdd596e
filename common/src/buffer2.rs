//! Flat row-major 2D buffer.
//!
//! Element `(x, y)` lives at `y * width + x`. Image planes, threshold masks
//! and label maps all share this layout, and the buffer derefs to its slice
//! so whole-plane passes stay plain slice code.

use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::slice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer2<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> Buffer2<T> {
    /// Wraps `data` as a `width` x `height` plane.
    ///
    /// # Panics
    /// If `data.len() != width * height`.
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "buffer of {} elements cannot hold a {width}x{height} plane",
            data.len()
        );
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// True if signed coordinates fall inside the plane.
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        (0..self.width as i64).contains(&x) && (0..self.height as i64).contains(&y)
    }

    /// Element at signed coordinates, or `None` outside the plane.
    #[inline]
    pub fn get_checked(&self, x: i64, y: i64) -> Option<&T> {
        self.contains(x, y)
            .then(|| &self.data[self.offset(x as usize, y as usize)])
    }

    pub fn row(&self, y: usize) -> &[T] {
        let start = self.offset(0, y);
        &self.data[start..start + self.width]
    }

    /// Rows top to bottom in storage order.
    pub fn rows(&self) -> slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.width.max(1))
    }

    /// Same-shaped buffer with `f` applied to every element.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Buffer2<U> {
        Buffer2::new(self.width, self.height, self.data.iter().map(f).collect())
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }
}

impl<T: Clone> Buffer2<T> {
    pub fn new_filled(width: usize, height: usize, value: T) -> Self {
        Self::new(width, height, vec![value; width * height])
    }
}

impl<T: Clone + Default> Buffer2<T> {
    pub fn new_default(width: usize, height: usize) -> Self {
        Self::new_filled(width, height, T::default())
    }
}

impl<T> Index<(usize, usize)> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        debug_assert!(x < self.width && y < self.height);
        &self.data[self.offset(x, y)]
    }
}

impl<T> IndexMut<(usize, usize)> for Buffer2<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        debug_assert!(x < self.width && y < self.height);
        let offset = self.offset(x, y);
        &mut self.data[offset]
    }
}

impl<T> Deref for Buffer2<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for Buffer2<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}
