use image::{GrayImage, Luma};

/// Word the engine must read back from [`reference_image`].
pub const REFERENCE_TEXT: &str = "test";

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const SCALE: u32 = 8;
const MARGIN: u32 = 24;

fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        _ => return None,
    };
    Some(rows)
}

/// Dark block letters on white, large enough for the engine's single-word mode.
pub fn render_word(word: &str) -> GrayImage {
    let glyphs: Vec<[u8; 7]> = word.chars().filter_map(|c| glyph(c.to_ascii_uppercase())).collect();
    let advance = (GLYPH_WIDTH + 1) * SCALE;
    let width = MARGIN * 2 + advance * glyphs.len() as u32;
    let height = MARGIN * 2 + GLYPH_HEIGHT * SCALE;
    let mut image = GrayImage::from_pixel(width.max(1), height, Luma([255]));

    for (index, rows) in glyphs.iter().enumerate() {
        let origin_x = MARGIN + index as u32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        image.put_pixel(
                            origin_x + col * SCALE + dx,
                            MARGIN + row as u32 * SCALE + dy,
                            Luma([0]),
                        );
                    }
                }
            }
        }
    }
    image
}

pub fn reference_image() -> GrayImage {
    render_word(REFERENCE_TEXT)
}
