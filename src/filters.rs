use crate::error::FilterError;

/// Per-scanline transform applied before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Filter {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl Filter {
    pub const ALL: [Self; 5] = [Self::None, Self::Sub, Self::Up, Self::Average, Self::Paeth];

    /// Filters byte `x` given its reconstructed neighbours: `a` to the left,
    /// `b` above and `c` above-left.
    pub fn filter(&self, x: u8, a: u8, b: u8, c: u8) -> u8 {
        x.wrapping_sub(self.predict(a, b, c))
    }

    pub fn reconstruct(&self, x: u8, a: u8, b: u8, c: u8) -> u8 {
        x.wrapping_add(self.predict(a, b, c))
    }

    fn predict(&self, a: u8, b: u8, c: u8) -> u8 {
        match self {
            Filter::None => 0,
            Filter::Sub => a,
            Filter::Up => b,
            Filter::Average => ((a as u16 + b as u16) / 2) as u8,
            Filter::Paeth => paeth_predictor(a, b, c),
        }
    }
}

impl TryFrom<u8> for Filter {
    type Error = FilterError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Sub),
            2 => Ok(Self::Up),
            3 => Ok(Self::Average),
            4 => Ok(Self::Paeth),
            i => Err(FilterError::UnknownFilter(i)),
        }
    }
}

/// Whichever of left, up and upper-left is closest to `left + up - upper_left`,
/// preferring them in that order on ties.
fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Filters one row. `previous` is the row above, unfiltered, or `None` for
/// the first row of an image or pass.
///
/// # Panics
///
/// If `previous` is shorter than `row`.
pub fn filter_scanline(
    filter: Filter,
    row: &[u8],
    previous: Option<&[u8]>,
    bpp: usize,
    out: &mut Vec<u8>,
) {
    check_previous(row, previous);
    for (i, &x) in row.iter().enumerate() {
        let (a, b, c) = neighbours(row, previous, i, bpp);
        out.push(filter.filter(x, a, b, c));
    }
}

/// Reverses [`filter_scanline`] in place.
///
/// # Panics
///
/// If `previous` is shorter than `row`.
pub fn reconstruct_scanline(filter: Filter, row: &mut [u8], previous: Option<&[u8]>, bpp: usize) {
    check_previous(row, previous);
    match (filter, previous) {
        (Filter::None, _) | (Filter::Up, None) => {}
        (Filter::Sub, _) | (Filter::Paeth, None) => {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        _ => {
            for i in 0..row.len() {
                let (a, b, c) = neighbours(row, previous, i, bpp);
                row[i] = filter.reconstruct(row[i], a, b, c);
            }
        }
    }
}

fn check_previous(row: &[u8], previous: Option<&[u8]>) {
    if let Some(previous) = previous {
        assert!(
            previous.len() >= row.len(),
            "previous row has {} bytes, expected at least {}",
            previous.len(),
            row.len()
        );
    }
}

fn neighbours(row: &[u8], previous: Option<&[u8]>, i: usize, bpp: usize) -> (u8, u8, u8) {
    let a = if i >= bpp { row[i - bpp] } else { 0 };
    let (b, c) = match previous {
        Some(previous) => (previous[i], if i >= bpp { previous[i - bpp] } else { 0 }),
        None => (0, 0),
    };
    (a, b, c)
}

/// Reconstructs a scanline that still carries its leading filter-type byte.
pub(crate) fn defilter(
    line: &mut [u8],
    previous: Option<&[u8]>,
    bpp: usize,
) -> Result<(), FilterError> {
    let Some((&mut kind, row)) = line.split_first_mut() else {
        return Ok(());
    };
    reconstruct_scanline(Filter::try_from(kind)?, row, previous, bpp);
    Ok(())
}

/// A subset of the five filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSet(u8);

impl FilterSet {
    pub const ALL: Self = Self(0b1_1111);
    pub const EMPTY: Self = Self(0);

    pub fn only(filter: Filter) -> Self {
        Self(1 << filter as u8)
    }

    pub fn contains(&self, filter: Filter) -> bool {
        self.0 & (1 << filter as u8) != 0
    }

    pub fn insert(&mut self, filter: Filter) {
        self.0 |= 1 << filter as u8;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Filter> + '_ {
        Filter::ALL.into_iter().filter(|&filter| self.contains(filter))
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<T: IntoIterator<Item = Filter>>(iter: T) -> Self {
        let mut set = Self::EMPTY;
        for filter in iter {
            set.insert(filter);
        }
        set
    }
}

/// Picks and applies a filter for each row of one image or pass.
///
/// The choice minimises the sum of the residuals read as signed bytes. An
/// empty set falls back to no filtering.
#[derive(Debug)]
pub struct Filterer {
    filters: FilterSet,
    bpp: usize,
    previous: Option<Vec<u8>>,
    candidate: Vec<u8>,
    best: Vec<u8>,
}

impl Filterer {
    pub fn new(filters: FilterSet, bpp: usize) -> Self {
        Self {
            filters,
            bpp,
            previous: None,
            candidate: Vec::new(),
            best: Vec::new(),
        }
    }

    /// Forgets the previous row, as at the start of an interlace pass.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Appends the filter-type byte and the filtered row to `out`.
    pub fn filter_row(&mut self, row: &[u8], out: &mut Vec<u8>) -> Filter {
        let mut chosen = None;
        let mut lowest = u64::MAX;
        for filter in self.filters.iter() {
            self.candidate.clear();
            filter_scanline(filter, row, self.previous.as_deref(), self.bpp, &mut self.candidate);
            let cost = self
                .candidate
                .iter()
                .map(|&residual| (residual as i8).unsigned_abs() as u64)
                .sum();
            if cost < lowest {
                lowest = cost;
                chosen = Some(filter);
                std::mem::swap(&mut self.candidate, &mut self.best);
            }
        }
        let filter = match chosen {
            Some(filter) => filter,
            None => {
                self.best.clear();
                self.best.extend_from_slice(row);
                Filter::None
            }
        };
        out.push(filter as u8);
        out.extend_from_slice(&self.best);
        let previous = self.previous.get_or_insert_with(Vec::new);
        previous.clear();
        previous.extend_from_slice(row);
        filter
    }
}
