// A rectangular raster with a geographic extent. The origin cell (0,0) sits at
// the top-left corner; x increases with column and y increases with row.

const SPATIAL_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, Default)]
pub struct Extent {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

#[derive(Clone)]
pub struct Grid<T> {
    pub rows: usize,
    pub cols: usize,
    pub cell_size: f64,
    pub extent: Extent,
    pub no_data: T,
    pub data: Vec<T>, //row-major, data[y * cols + x]
}

pub type FloatGrid = Grid<f32>;
pub type LongGrid = Grid<i64>;

impl<T: Copy + PartialEq> Grid<T> {
    /*
    Constructor. The extent is derived from the top-left corner, the cell size
    and the grid dimensions.
    */
    pub fn new(rows: usize, cols: usize, cell_size: f64, left: f64, top: f64,
               no_data: T, fill: T) -> Grid<T> {
        Grid {
            rows,
            cols,
            cell_size,
            extent: Extent {
                left,
                right: left + cell_size * (cols as f64),
                top,
                bottom: top - cell_size * (rows as f64),
            },
            no_data,
            data: vec![fill; rows * cols],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.cols + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.cols + x] = value;
    }

    pub fn is_no_data(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == self.no_data
    }

    /*
    Bounds check for signed cell coordinates, handy when probing neighbours.
     */
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.cols && (y as usize) < self.rows
    }

    /*
    Returns the geographic coordinates (lon, lat) of a cell centre.
     */
    pub fn ref_loc(&self, x: usize, y: usize) -> (f64, f64) {
        let lon = self.extent.left + self.cell_size * (x as f64 + 0.5);
        let lat = self.extent.top - self.cell_size * (y as f64 + 0.5);
        (lon, lat)
    }

    /*
    Returns the cell containing a geographic point, or None when the point lies
    outside the grid extent.
     */
    pub fn grid_loc(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        if lon < self.extent.left || lon >= self.extent.right {
            return None;
        }
        if lat > self.extent.top || lat <= self.extent.bottom {
            return None;
        }
        let x = ((lon - self.extent.left) / self.cell_size).floor() as usize;
        let y = ((self.extent.top - lat) / self.cell_size).floor() as usize;
        if x >= self.cols || y >= self.rows {
            return None;
        }
        Some((x, y))
    }

    /*
    True iff the other grid covers the same extent at the same resolution.
    State rasters are only cross-loaded between spatially matching grids.
     */
    pub fn is_spatial_match<U: Copy + PartialEq>(&self, other: &Grid<U>) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && (self.cell_size - other.cell_size).abs() < SPATIAL_TOLERANCE
            && (self.extent.left - other.extent.left).abs() < SPATIAL_TOLERANCE
            && (self.extent.top - other.extent.top).abs() < SPATIAL_TOLERANCE
    }
}
