use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use coax3174::display::Display;
use coax3174::ebcdic::encode_str;
use coax3174::error::LinkResult;
use coax3174::link::{DeviceLink, Interface};
use coax3174::terminal::Dimensions;
use coax3174::tn3270::codes::{CMD_ERASE_WRITE, ORDER_SBA, ORDER_SF, WCC_RESTORE};
use coax3174::tn3270::addressing::encode_address;
use coax3174::tn3270::Tn3270Codec;
use coax3174::vt100::Vt100Codec;
use coax3174::ScreenBuffer;

// Interface that acknowledges every command
struct AckInterface;

impl Interface for AckInterface {
    fn reset(&mut self) -> LinkResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn transmit_receive(&mut self, _words: &[u16], _receive_length: usize, _timeout: Duration) -> LinkResult<Vec<u16>> {
        Ok(vec![0b10])
    }
}

/// A formatted screen: label and input field on every row
fn full_screen_record() -> Vec<u8> {
    let mut data = vec![CMD_ERASE_WRITE, WCC_RESTORE];
    for row in 0..24 {
        let [b1, b2] = encode_address(row * 80, 1920);
        data.extend([ORDER_SBA, b1, b2, ORDER_SF, 0x60]);
        data.extend(encode_str(&format!("FIELD {:02} ....", row)));
        data.extend([ORDER_SF, 0x40]);
        data.extend(encode_str("input value"));
    }
    data
}

fn bench_tn3270_decode(c: &mut Criterion) {
    let data = full_screen_record();
    let buffer = ScreenBuffer::new(24, 80);

    c.bench_function("tn3270_decode_full_screen", |b| {
        b.iter(|| {
            let mut codec = Tn3270Codec::new();
            black_box(codec.decode(black_box(&data), &buffer)).unwrap();
        })
    });
}

fn bench_vt100_decode(c: &mut Criterion) {
    let mut data = Vec::new();
    for line in 0..200 {
        data.extend(format!("\x1b[1mline\x1b[0m {:04}: the quick brown fox\r\n", line).into_bytes());
    }

    c.bench_function("vt100_decode_scrolling", |b| {
        b.iter(|| {
            let mut codec = Vt100Codec::new(24, 80);
            black_box(codec.decode(black_box(&data)));
        })
    });
}

fn bench_display_flush(c: &mut Criterion) {
    let data = full_screen_record();
    let mut buffer = ScreenBuffer::new(24, 80);
    let output = Tn3270Codec::new().decode(&data, &buffer).unwrap();
    buffer.apply_all(&output.ops).unwrap();

    c.bench_function("display_render_and_flush", |b| {
        b.iter(|| {
            let mut link = DeviceLink::new(AckInterface, Duration::from_millis(100));
            let mut display = Display::new(Dimensions::new(24, 80));
            display.render(black_box(&buffer));
            black_box(display.flush(&mut link, buffer.cursor())).unwrap();
        })
    });
}

criterion_group!(benches, bench_tn3270_decode, bench_vt100_decode, bench_display_flush);
criterion_main!(benches);
