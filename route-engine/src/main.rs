use std::sync::Arc;

use futures::future::join_all;
use tracing_subscriber::EnvFilter;

use route_engine::domain::{Cell, CellBox, Domain, Segment, Tunnel};
use route_engine::engine::Engine;
use route_engine::events::TracingSink;
use route_engine::navigation::{DoorMode, GridWorld, Mode, WalkMode};
use route_engine::planner::{ResultState, SearchConfig, SessionRequest};
use route_engine::records::{MemoryPathRecordStore, PathRecordStore};
use route_engine::tunnels::StaticTunnels;

const SURFACE: Domain = Domain(0);
const CAVES: Domain = Domain(1);

/// Two flat domains: the surface has a walled yard with a door, the caves
/// are reached through a ladder.
fn demo_world() -> GridWorld {
    let surface = CellBox::new(Cell::new(-32, -1, -32, SURFACE), Cell::new(32, 4, 32, SURFACE))
        .expect("corners share a domain");
    let caves = CellBox::new(Cell::new(-16, -1, -16, CAVES), Cell::new(16, 3, 16, CAVES))
        .expect("corners share a domain");
    let wall = CellBox::new(Cell::new(10, 0, -8, SURFACE), Cell::new(10, 2, 8, SURFACE))
        .expect("corners share a domain");

    GridWorld::builder()
        .bounds(surface)
        .floor(surface, -1)
        .bounds(caves)
        .floor(caves, -1)
        .fill(wall)
        .door(Cell::new(10, 0, 0, SURFACE))
        .door(Cell::new(10, 1, 0, SURFACE))
        .build()
}

fn demo_tunnels() -> StaticTunnels {
    StaticTunnels::builder()
        .add(
            Tunnel::new(Cell::new(-6, 0, 4, SURFACE), Cell::new(0, 0, 0, CAVES), 12)
                .expect("tunnel cost is non-negative")
                .with_name("ladder")
                .with_prompt(|| println!("  (climb down the ladder)")),
        )
        .build()
}

fn describe(segment: &Segment) -> String {
    match segment {
        Segment::Path(path) => format!(
            "walk {} -> {} ({} steps, cost {:.2}, {})",
            path.origin(),
            path.destination(),
            path.len(),
            path.cost(),
            path.mode_types()
        ),
        Segment::Tunnel(tunnel) => format!(
            "take {} to {} (cost {})",
            tunnel.name().unwrap_or("tunnel"),
            tunnel.exit(),
            tunnel.cost()
        ),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Optional path to a JSON config file
    let config = match std::env::args().nth(1) {
        Some(path) => SearchConfig::from_json_file(&path).expect("Failed to load config"),
        None => SearchConfig::default(),
    };

    let records = Arc::new(MemoryPathRecordStore::new());
    let engine = Engine::builder(config)
        .blocks(Arc::new(demo_world()))
        .tunnels(Arc::new(demo_tunnels()))
        .records(records.clone())
        .events(Arc::new(TracingSink))
        .build()
        .expect("Failed to start engine");

    let modes: Vec<Arc<dyn Mode>> = vec![Arc::new(WalkMode), Arc::new(DoorMode)];
    let home = Cell::new(0, 0, 0, SURFACE);
    let requests = vec![
        SessionRequest::new(home, Cell::new(8, 0, -5, SURFACE), modes.clone()),
        SessionRequest::new(home, Cell::new(20, 0, 0, SURFACE), modes.clone()),
        SessionRequest::new(home, Cell::new(5, 0, 5, CAVES), modes.clone()),
        SessionRequest::new(home, Cell::new(8, 0, -5, SURFACE), modes),
    ];

    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| engine.start_session(request).expect("engine is running"))
        .collect();
    let states = join_all(handles.iter().map(|h| h.wait())).await;

    for (handle, state) in handles.iter().zip(states) {
        println!("Session {}: {}", handle.id(), state);
        let Some(itinerary) = handle.best().filter(|_| state == ResultState::Successful) else {
            continue;
        };
        println!("  total cost {:.2}", itinerary.cost());
        for segment in itinerary.segments() {
            println!("  {}", describe(segment));
            if let Segment::Tunnel(tunnel) = segment {
                tunnel.prompt();
            }
        }
        println!("  searched for {:?}", handle.execution_time());
    }

    println!("Cached {} paths", records.len());
    engine.shutdown().await;
}
