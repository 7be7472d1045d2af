//! Performance benchmarks for the hot paths of a session

use server::record::MoveRecord;
use shared::chess::Board;
use shared::{FrameDecoder, Message, Move};
use std::time::Instant;

/// Benchmarks encoding and decoding of board updates, the largest regular message
#[test]
fn benchmark_board_frame_codec() {
    let message = Message::Board {
        is_capture: false,
        state: Board::new().to_epd(),
    };

    let iterations = 20_000;
    let start = Instant::now();

    let mut decoder = FrameDecoder::default();
    for _ in 0..iterations {
        let bytes = message.encode();
        let frames = decoder.feed(&bytes).unwrap();
        let _ = Message::decode(&frames[0]).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Board frame codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Generous bound so unoptimized builds pass as well
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks decoding a stream that arrives in small chunks
#[test]
fn benchmark_fragmented_stream() {
    let mut stream = Vec::new();
    for i in 0..2_000u32 {
        stream.extend(
            Message::Move {
                from: (i % 64) as u8,
                to: ((i + 8) % 64) as u8,
            }
            .encode(),
        );
    }

    let start = Instant::now();
    let mut decoder = FrameDecoder::default();
    let mut decoded = 0;
    for chunk in stream.chunks(3) {
        decoded += decoder.feed(chunk).unwrap().len();
    }
    let duration = start.elapsed();

    println!("Fragmented stream: {} frames in {:?}", decoded, duration);

    assert_eq!(decoded, 2_000);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks legal move generation from a busy middlegame position
#[test]
fn benchmark_legal_move_generation() {
    let board = Board::from_fen("r1bqk2r/pppp1ppp/2n2n2/2b1p3/2B1P3/3P1N2/PPP2PPP/RNBQK2R w KQkq - 1 5")
        .unwrap();

    let iterations = 2_000;
    let start = Instant::now();

    let mut total = 0;
    for _ in 0..iterations {
        total += board.legal_moves().len();
    }

    let duration = start.elapsed();
    println!(
        "Legal moves: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(total > 0);
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks playing out and recording a long game, as the server does per move
#[test]
fn benchmark_game_with_record() {
    let start = Instant::now();

    let mut board = Board::new();
    let mut record = MoveRecord::new();
    let mut plies = 0;

    // Knights shuffling back and forth until the position repeats five times
    let shuffle = [
        Move::new(6, 21),
        Move::new(62, 45),
        Move::new(21, 6),
        Move::new(45, 62),
    ];
    while board.outcome().is_none() {
        let mv = shuffle[plies % shuffle.len()];
        board.push(mv).unwrap();
        record.push_move(&mv);
        let _ = record.to_json().unwrap();
        plies += 1;
    }

    let duration = start.elapsed();
    println!("Played {} plies with recording in {:?}", plies, duration);

    assert_eq!(plies, 16);
    assert!(duration.as_millis() < 2000);
}
