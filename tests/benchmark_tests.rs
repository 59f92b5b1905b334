//! Performance benchmarks for the board engine and the wire codec

use shared::{decode, encode, Board, Cell, Frame, Packet, MAX_BOARD_DIMENSION};
use std::time::Instant;

/// Benchmarks flood fill over the largest board
#[test]
fn benchmark_full_board_fill() {
    let iterations = 10;
    let start = Instant::now();

    for _ in 0..iterations {
        let mut board = Board::new(MAX_BOARD_DIMENSION, MAX_BOARD_DIMENSION);
        let delta = board.fill(0, Cell::new(0, 0));
        assert!(board.is_full());
        assert_eq!(delta.len(), (MAX_BOARD_DIMENSION * MAX_BOARD_DIMENSION) as usize);
    }

    let duration = start.elapsed();
    println!(
        "Full board fill: {} iterations in {:?} ({:.2} ms/iter)",
        iterations,
        duration,
        duration.as_millis() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds even unoptimized
    assert!(duration.as_secs() < 5);
}

/// Benchmarks a wall that cuts a corner off a large board
#[test]
fn benchmark_wall_capture() {
    let size = 128;
    let start = Instant::now();

    let mut board = Board::new(size, size);
    let mut captured = 0;
    // A vertical wall at x = 8 encloses the narrow strip on the left.
    for y in 0..size {
        captured += board.capture(0, Cell::new(8, y)).len();
    }

    let duration = start.elapsed();
    println!(
        "Wall capture on {}x{}: {} cells in {:?}",
        size, size, captured, duration
    );

    assert_eq!(board.scores()[&0], (9 * size) as usize);
    assert!(duration.as_secs() < 5);
}

/// Benchmarks random-looking clicks the way a busy match produces them
#[test]
fn benchmark_scattered_clicks() {
    let size = 64u32;
    let mut board = Board::new(size, size);

    let clicks = 500u32;
    let start = Instant::now();

    for i in 0..clicks {
        let cell = Cell::new((i * 37) % size, (i * 101) % size);
        let _ = board.capture(i % 4, cell);
    }

    let duration = start.elapsed();
    println!(
        "Scattered clicks: {} clicks in {:?} ({:.2} μs/click)",
        clicks,
        duration,
        duration.as_micros() as f64 / clicks as f64
    );

    assert!(board.claimed() > 0);
    assert!(duration.as_secs() < 10);
}

/// Benchmarks encoding and decoding full board updates
#[test]
fn benchmark_board_update_codec() {
    let cells: Vec<Cell> = (0..512).map(|i| Cell::new(i % 256, i / 256)).collect();
    let packet = Packet::BoardUpdate {
        player_id: 3,
        cells,
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let data = encode(&packet).unwrap();
        let frame = decode(&data).unwrap();
        assert!(matches!(frame, Frame::Packet(Packet::BoardUpdate { .. })));
    }

    let duration = start.elapsed();
    println!(
        "BoardUpdate codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_secs() < 5);
}

/// Benchmarks splitting a full board into update packets
#[test]
fn benchmark_board_update_chunking() {
    let mut board = Board::new(MAX_BOARD_DIMENSION, MAX_BOARD_DIMENSION);
    let delta = board.fill(1, Cell::new(0, 0));

    let iterations = 100;
    let start = Instant::now();

    let mut packets = Vec::new();
    for _ in 0..iterations {
        packets = Packet::board_updates(1, &delta);
    }

    let duration = start.elapsed();
    println!(
        "Chunking {} cells: {} iterations in {:?}",
        delta.len(),
        iterations,
        duration
    );

    assert_eq!(packets.len(), delta.len().div_ceil(shared::MAX_CELLS_PER_UPDATE));
    for packet in &packets {
        assert!(encode(packet).is_ok());
    }
    assert!(duration.as_secs() < 5);
}
