//! Sentinel values marking unused slots in mapped arrays.

/// A type that can live in a memory-mapped array.
///
/// `EMPTY` marks a slot that has never been written. Arrays reopened from
/// disk recover their logical size by trimming trailing `EMPTY` slots.
///
/// # Safety
///
/// Implementors must be plain old data: `Copy`, without padding or pointers,
/// and every bit pattern read back from a file must be a valid value.
pub unsafe trait EmptyValue: Copy + PartialEq {
    /// Marker for unused slots.
    const EMPTY: Self;
}

macro_rules! impl_empty_zero {
    ($($t:ty),*) => {
        $(
            unsafe impl EmptyValue for $t {
                const EMPTY: Self = 0;
            }
        )*
    };
}

impl_empty_zero!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Fixed-point coordinate precision (1e-7 degrees).
pub const COORDINATE_PRECISION: i32 = 10_000_000;

/// Coordinate value of an undefined location.
pub const UNDEFINED_COORDINATE: i32 = i32::MAX;

/// A fixed-point geographic location, the usual payload of id→location indexes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    x: i32,
    y: i32,
}

impl Location {
    /// The undefined location.
    pub const UNDEFINED: Location = Location {
        x: UNDEFINED_COORDINATE,
        y: UNDEFINED_COORDINATE,
    };

    /// Create a location from fixed-point coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Create a location from degrees, rounding to the fixed-point grid.
    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Self {
            x: (lon * COORDINATE_PRECISION as f64).round() as i32,
            y: (lat * COORDINATE_PRECISION as f64).round() as i32,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// Longitude in degrees.
    pub fn lon(&self) -> f64 {
        self.x as f64 / COORDINATE_PRECISION as f64
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.y as f64 / COORDINATE_PRECISION as f64
    }

    /// Whether both coordinates are set.
    pub fn is_defined(&self) -> bool {
        self.x != UNDEFINED_COORDINATE || self.y != UNDEFINED_COORDINATE
    }

    /// Whether the location is defined and within the valid lon/lat range.
    pub fn is_valid(&self) -> bool {
        self.x >= -180 * COORDINATE_PRECISION
            && self.x <= 180 * COORDINATE_PRECISION
            && self.y >= -90 * COORDINATE_PRECISION
            && self.y <= 90 * COORDINATE_PRECISION
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

unsafe impl EmptyValue for Location {
    const EMPTY: Self = Location::UNDEFINED;
}
