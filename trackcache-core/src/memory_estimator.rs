/// Estimates how many bytes a value occupies, used as the cost of entries
/// inserted with [`MemoryTier::set_estimated`](crate::MemoryTier::set_estimated).
///
/// The default implementation only counts the inline size of the value.
/// Types owning heap data should add their heap allocations.
///
/// # Examples
///
/// ```
/// use trackcache_core::MemoryEstimator;
///
/// struct Thumbnail {
///     pixels: Vec<u8>,
/// }
///
/// impl MemoryEstimator for Thumbnail {
///     fn estimate_memory(&self) -> usize {
///         std::mem::size_of::<Self>() + self.pixels.capacity()
///     }
/// }
///
/// let thumb = Thumbnail { pixels: vec![0; 1024] };
/// assert!(thumb.estimate_memory() >= 1024);
/// ```
pub trait MemoryEstimator {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

macro_rules! inline_only {
    ($($t:ty),* $(,)?) => {
        $(impl MemoryEstimator for $t {})*
    };
}

inline_only!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, ());

impl MemoryEstimator for String {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + self.capacity()
    }
}

impl<T: MemoryEstimator> MemoryEstimator for Vec<T> {
    fn estimate_memory(&self) -> usize {
        // Unused capacity still occupies memory
        let spare = (self.capacity() - self.len()) * std::mem::size_of::<T>();
        std::mem::size_of::<Self>()
            + spare
            + self.iter().map(MemoryEstimator::estimate_memory).sum::<usize>()
    }
}

impl<T: MemoryEstimator> MemoryEstimator for Option<T> {
    fn estimate_memory(&self) -> usize {
        match self {
            Some(value) => {
                std::mem::size_of::<Self>() - std::mem::size_of::<T>() + value.estimate_memory()
            }
            None => std::mem::size_of::<Self>(),
        }
    }
}

impl<T: MemoryEstimator + ?Sized> MemoryEstimator for Box<T> {
    fn estimate_memory(&self) -> usize {
        std::mem::size_of::<Self>() + (**self).estimate_memory()
    }
}
