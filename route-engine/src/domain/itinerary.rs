//! Itinerary types.
//!
//! An `Itinerary` represents a complete route from origin to destination,
//! potentially including multiple path segments joined by tunnels.

use super::{Cell, DomainError, Path, Tunnel};

/// A segment of an itinerary: either a walked path or a tunnel traversal.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Physical movement within one domain
    Path(Path),
    /// A jump through a tunnel
    Tunnel(Tunnel),
}

impl Segment {
    /// Returns the cost of this segment.
    pub fn cost(&self) -> f64 {
        match self {
            Segment::Path(path) => path.cost(),
            Segment::Tunnel(tunnel) => f64::from(tunnel.cost()),
        }
    }

    /// Returns true if this is a path segment.
    pub fn is_path(&self) -> bool {
        matches!(self, Segment::Path(_))
    }

    /// Returns true if this is a tunnel segment.
    pub fn is_tunnel(&self) -> bool {
        matches!(self, Segment::Tunnel(_))
    }

    /// Returns the path if this is a path segment.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Segment::Path(path) => Some(path),
            Segment::Tunnel(_) => None,
        }
    }

    /// Returns the tunnel if this is a tunnel segment.
    pub fn as_tunnel(&self) -> Option<&Tunnel> {
        match self {
            Segment::Path(_) => None,
            Segment::Tunnel(tunnel) => Some(tunnel),
        }
    }
}

/// A complete route from origin to destination.
///
/// Segments alternate: Path, Tunnel, Path, Tunnel, ..., Path.
///
/// # Invariants
///
/// - At least one segment, starting and ending with a path
/// - Each path ends at a cell satisfying the next tunnel's entrance
/// - Each tunnel exits at the origin of the next path
#[derive(Debug, Clone)]
pub struct Itinerary {
    segments: Vec<Segment>,
}

impl Itinerary {
    /// Constructs an itinerary from alternating segments.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - Segments list is empty
    /// - Segments don't alternate starting and ending with a path
    /// - Segments don't connect
    pub fn new(segments: Vec<Segment>) -> Result<Self, DomainError> {
        if segments.is_empty() {
            return Err(DomainError::EmptyItinerary);
        }

        for window in segments.windows(2) {
            match (&window[0], &window[1]) {
                (Segment::Path(path), Segment::Tunnel(tunnel)) => {
                    if !tunnel.entrance().is_satisfied_by(&path.destination()) {
                        let aim = tunnel.entrance().get(&path.destination()).unwrap_or(path.destination());
                        return Err(DomainError::SegmentsNotConnected(path.destination(), aim));
                    }
                }
                (Segment::Tunnel(tunnel), Segment::Path(path)) => {
                    if tunnel.exit() != path.origin() {
                        return Err(DomainError::SegmentsNotConnected(tunnel.exit(), path.origin()));
                    }
                }
                (prev, next) => {
                    return Err(DomainError::SegmentsNotConnected(
                        segment_end(prev),
                        segment_start(next),
                    ));
                }
            }
        }

        let first = &segments[0];
        let last = &segments[segments.len() - 1];
        if !first.is_path() || !last.is_path() {
            return Err(DomainError::SegmentsNotConnected(segment_end(last), segment_start(first)));
        }

        Ok(Itinerary { segments })
    }

    /// Returns all segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns all paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.segments.iter().filter_map(|s| s.as_path())
    }

    /// Returns all tunnels in order.
    pub fn tunnels(&self) -> impl Iterator<Item = &Tunnel> {
        self.segments.iter().filter_map(|s| s.as_tunnel())
    }

    /// Returns the number of tunnels taken.
    pub fn tunnel_count(&self) -> usize {
        self.tunnels().count()
    }

    /// Returns the origin cell.
    pub fn origin(&self) -> Cell {
        segment_start(&self.segments[0])
    }

    /// Returns the final cell.
    pub fn destination(&self) -> Cell {
        segment_end(&self.segments[self.segments.len() - 1])
    }

    /// Returns the total cost: paths plus tunnels.
    pub fn cost(&self) -> f64 {
        self.segments.iter().map(Segment::cost).sum()
    }

    /// Returns true if no tunnel is needed.
    pub fn is_direct(&self) -> bool {
        self.tunnel_count() == 0
    }
}

fn segment_start(segment: &Segment) -> Cell {
    match segment {
        Segment::Path(path) => path.origin(),
        Segment::Tunnel(tunnel) => tunnel.exit(),
    }
}

fn segment_end(segment: &Segment) -> Cell {
    match segment {
        Segment::Path(path) => path.destination(),
        Segment::Tunnel(tunnel) => tunnel.exit(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellBox, Domain, ModeType, Step};

    const OVER: Domain = Domain(0);
    const UNDER: Domain = Domain(1);

    fn straight(from: Cell, len: i32) -> Path {
        let mut steps = vec![Step::start(from)];
        for dx in 1..=len {
            steps.push(Step::new(from.offset(dx, 0, 0), 1.0, ModeType::Walk));
        }
        Path::from_steps(steps).unwrap()
    }

    #[test]
    fn direct_itinerary() {
        let path = straight(Cell::new(0, 0, 0, OVER), 4);
        let itinerary = Itinerary::new(vec![Segment::Path(path)]).unwrap();

        assert!(itinerary.is_direct());
        assert_eq!(itinerary.segment_count(), 1);
        assert_eq!(itinerary.origin(), Cell::new(0, 0, 0, OVER));
        assert_eq!(itinerary.destination(), Cell::new(4, 0, 0, OVER));
        assert_eq!(itinerary.cost(), 4.0);
    }

    #[test]
    fn itinerary_through_tunnel() {
        let first = straight(Cell::new(0, 0, 0, OVER), 3);
        let tunnel = Tunnel::new(Cell::new(3, 0, 0, OVER), Cell::new(0, 0, 0, UNDER), 5).unwrap();
        let second = straight(Cell::new(0, 0, 0, UNDER), 2);

        let itinerary = Itinerary::new(vec![
            Segment::Path(first),
            Segment::Tunnel(tunnel),
            Segment::Path(second),
        ])
        .unwrap();

        assert_eq!(itinerary.tunnel_count(), 1);
        assert_eq!(itinerary.paths().count(), 2);
        assert_eq!(itinerary.cost(), 3.0 + 5.0 + 2.0);
        assert_eq!(itinerary.destination(), Cell::new(2, 0, 0, UNDER));
    }

    #[test]
    fn region_entrance_accepts_any_cell_inside() {
        let first = straight(Cell::new(0, 0, 0, OVER), 3);
        let entrance = CellBox::new(Cell::new(2, 0, -1, OVER), Cell::new(4, 1, 1, OVER)).unwrap();
        let tunnel = Tunnel::new(entrance, Cell::new(0, 0, 0, UNDER), 1).unwrap();
        let second = Path::stationary(Cell::new(0, 0, 0, UNDER));

        let result = Itinerary::new(vec![
            Segment::Path(first),
            Segment::Tunnel(tunnel),
            Segment::Path(second),
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn empty_itinerary_rejected() {
        assert!(matches!(Itinerary::new(vec![]), Err(DomainError::EmptyItinerary)));
    }

    #[test]
    fn disconnected_entrance_rejected() {
        let first = straight(Cell::new(0, 0, 0, OVER), 2);
        let tunnel = Tunnel::new(Cell::new(9, 0, 0, OVER), Cell::new(0, 0, 0, UNDER), 1).unwrap();
        let second = Path::stationary(Cell::new(0, 0, 0, UNDER));

        let result = Itinerary::new(vec![
            Segment::Path(first),
            Segment::Tunnel(tunnel),
            Segment::Path(second),
        ]);
        assert!(matches!(result, Err(DomainError::SegmentsNotConnected(_, _))));
    }

    #[test]
    fn disconnected_exit_rejected() {
        let first = Path::stationary(Cell::new(0, 0, 0, OVER));
        let tunnel = Tunnel::new(Cell::new(0, 0, 0, OVER), Cell::new(0, 0, 0, UNDER), 1).unwrap();
        let second = Path::stationary(Cell::new(1, 0, 0, UNDER));

        let result = Itinerary::new(vec![
            Segment::Path(first),
            Segment::Tunnel(tunnel),
            Segment::Path(second),
        ]);
        assert!(matches!(result, Err(DomainError::SegmentsNotConnected(_, _))));
    }

    #[test]
    fn consecutive_paths_rejected() {
        let first = Path::stationary(Cell::new(0, 0, 0, OVER));
        let second = Path::stationary(Cell::new(0, 0, 0, OVER));
        let result = Itinerary::new(vec![Segment::Path(first), Segment::Path(second)]);
        assert!(matches!(result, Err(DomainError::SegmentsNotConnected(_, _))));
    }
}
