//! Exported frames decode back to the surface they were taken from.

use std::io::Read;

use flow_common::CanvasBound;
use renderer::png::create_png;
use renderer::{Color, Segment, Surface};

struct DecodedPng {
    width: u32,
    height: u32,
    color_type: u8,
    rgba: Vec<u8>,
}

/// Minimal decoder for the encoder's output: one IDAT, filter type 0.
fn decode(png: &[u8]) -> DecodedPng {
    assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    let mut pos = 8;
    let mut header = None;
    let mut idat = Vec::new();
    while pos < png.len() {
        let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
        let kind = &png[pos + 4..pos + 8];
        let data = &png[pos + 8..pos + 8 + len];
        let crc = u32::from_be_bytes(png[pos + 8 + len..pos + 12 + len].try_into().unwrap());
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(kind);
        hasher.update(data);
        assert_eq!(hasher.finalize(), crc, "bad CRC on {:?}", kind);

        match kind {
            b"IHDR" => {
                let width = u32::from_be_bytes(data[0..4].try_into().unwrap());
                let height = u32::from_be_bytes(data[4..8].try_into().unwrap());
                header = Some((width, height, data[9]));
            }
            b"IDAT" => idat.extend_from_slice(data),
            b"IEND" => break,
            _ => {}
        }
        pos += 12 + len;
    }

    let (width, height, color_type) = header.expect("missing IHDR");
    let mut raw = Vec::new();
    flate2::read::ZlibDecoder::new(&idat[..])
        .read_to_end(&mut raw)
        .unwrap();
    let stride = width as usize * 4;
    let mut rgba = Vec::with_capacity(stride * height as usize);
    for row in raw.chunks_exact(stride + 1) {
        assert_eq!(row[0], 0, "unexpected filter type");
        rgba.extend_from_slice(&row[1..]);
    }
    DecodedPng {
        width,
        height,
        color_type,
        rgba,
    }
}

fn trail_surface() -> Surface {
    let mut surface = Surface::new(48, 32).unwrap();
    surface.stroke_segments(
        Color::rgb(240, 80, 20),
        2.0,
        1.0,
        [
            Segment {
                from: [4.0, 8.0],
                to: [40.0, 8.0],
            },
            Segment {
                from: [10.0, 4.0],
                to: [10.0, 28.0],
            },
        ],
    );
    surface
}

#[test]
fn test_blank_frame_is_transparent() {
    let surface = Surface::new(16, 9).unwrap();
    let decoded = decode(&surface.to_png().unwrap());
    assert_eq!((decoded.width, decoded.height), (16, 9));
    assert_eq!(decoded.color_type, 6);
    assert!(decoded.rgba.iter().all(|&b| b == 0));
}

#[test]
fn test_frame_matches_surface_pixels() {
    let surface = trail_surface();
    let decoded = decode(&surface.to_png().unwrap());
    assert_eq!(decoded.rgba, surface.to_rgba());

    let at = |x: usize, y: usize| {
        let i = (y * decoded.width as usize + x) * 4;
        &decoded.rgba[i..i + 4]
    };
    assert!(at(20, 8)[3] > 200);
    assert_eq!(at(20, 20)[3], 0);
}

#[test]
fn test_faded_trails_keep_their_colour() {
    let mut surface = trail_surface();
    let bound = CanvasBound::build([0.0, 0.0], [48.0, 32.0], 48, 32);
    for _ in 0..5 {
        surface.fade(&bound, 0.9);
    }
    let decoded = decode(&surface.to_png().unwrap());
    let i = (8 * decoded.width as usize + 20) * 4;
    let px = &decoded.rgba[i..i + 4];
    assert!(px[3] > 0 && px[3] < 200, "alpha {}", px[3]);
    // Demultiplied output: the hue survives the fade.
    assert!(px[0] > px[1] && px[1] > px[2]);
}

#[test]
fn test_encoder_rejects_short_buffer() {
    assert!(create_png(&[0u8; 4 * 5], 3, 2).is_err());
}
