// Drainage direction codes as stored in the DDM raster. Codes 1 through 8 run
// clockwise from north; anything else is a sink (internal drainage or noData).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowDir {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    Sink,
}

impl FlowDir {
    pub fn from_code(code: i64) -> FlowDir {
        match code {
            1 => FlowDir::North,
            2 => FlowDir::NorthEast,
            3 => FlowDir::East,
            4 => FlowDir::SouthEast,
            5 => FlowDir::South,
            6 => FlowDir::SouthWest,
            7 => FlowDir::West,
            8 => FlowDir::NorthWest,
            _ => FlowDir::Sink,
        }
    }

    pub fn to_code(&self) -> i64 {
        match self {
            FlowDir::North => 1,
            FlowDir::NorthEast => 2,
            FlowDir::East => 3,
            FlowDir::SouthEast => 4,
            FlowDir::South => 5,
            FlowDir::SouthWest => 6,
            FlowDir::West => 7,
            FlowDir::NorthWest => 8,
            FlowDir::Sink => 0,
        }
    }

    /*
    Offset (dx, dy), relative to a receiving cell, of the neighbour that drains
    into it when the neighbour carries this direction code. The y axis grows
    with the row index, matching the raster.
     */
    pub fn inflow_offset(&self) -> Option<(i64, i64)> {
        match self {
            FlowDir::North => Some((0, 1)),
            FlowDir::NorthEast => Some((1, 1)),
            FlowDir::East => Some((1, 0)),
            FlowDir::SouthEast => Some((1, -1)),
            FlowDir::South => Some((0, -1)),
            FlowDir::SouthWest => Some((-1, -1)),
            FlowDir::West => Some((-1, 0)),
            FlowDir::NorthWest => Some((-1, 1)),
            FlowDir::Sink => None,
        }
    }

    /*
    Offset of the cell this code sends its water to, the negation of
    inflow_offset.
     */
    pub fn downstream_offset(&self) -> Option<(i64, i64)> {
        self.inflow_offset().map(|(dx, dy)| (-dx, -dy))
    }
}
