use image::RgbaImage;

use crate::geometry::{Point, Rect};

use super::SpriteError;

const WORD_BITS: i32 = 32;

/// Packed opacity bitmap of one sprite frame. Bit `c` of a row lives in word
/// `c / 32` at mask `0x8000_0000 >> (c % 32)`; padding bits are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMask {
    width: i32,
    height: i32,
    words_per_row: usize,
    bits: Vec<u32>,
}

impl PixelMask {
    pub fn from_image(image: &RgbaImage, source: Rect) -> Result<Self, SpriteError> {
        let image_bounds = Rect::new(0, 0, image.width() as i32, image.height() as i32);
        if source.is_empty() || !image_bounds.contains_rect(&source) {
            return Err(SpriteError::FrameOutOfImage {
                frame: source,
                image_width: image.width(),
                image_height: image.height(),
            });
        }
        Ok(Self::from_fn(source.width, source.height, |column, row| {
            let pixel = image.get_pixel((source.x + column) as u32, (source.y + row) as u32);
            pixel.0[3] != 0
        }))
    }

    pub fn from_fn(width: i32, height: i32, mut opaque: impl FnMut(i32, i32) -> bool) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let words_per_row = ((width + WORD_BITS - 1) / WORD_BITS) as usize;
        let mut bits = vec![0u32; words_per_row * height as usize];
        for row in 0..height {
            let row_start = row as usize * words_per_row;
            for column in 0..width {
                if opaque(column, row) {
                    let word = row_start + (column / WORD_BITS) as usize;
                    bits[word] |= 0x8000_0000 >> (column % WORD_BITS);
                }
            }
        }
        Self {
            width,
            height,
            words_per_row,
            bits,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_opaque(&self, column: i32, row: i32) -> bool {
        if column < 0 || row < 0 || column >= self.width || row >= self.height {
            return false;
        }
        let word = self.word(row, (column / WORD_BITS) as usize);
        word & (0x8000_0000 >> (column % WORD_BITS)) != 0
    }

    fn word(&self, row: i32, word_index: usize) -> u32 {
        if word_index >= self.words_per_row {
            return 0;
        }
        self.bits[row as usize * self.words_per_row + word_index]
    }

    pub fn bounds_at(&self, position: Point) -> Rect {
        Rect::new(position.x, position.y, self.width, self.height)
    }

    /// Whether an opaque pixel of `self` placed at `position` covers an opaque
    /// pixel of `other` placed at `other_position`.
    pub fn test_collision(&self, position: Point, other: &PixelMask, other_position: Point) -> bool {
        let bounds = self.bounds_at(position);
        let other_bounds = other.bounds_at(other_position);
        let Some(intersection) = bounds.intersection(&other_bounds) else {
            return false;
        };

        // `a` starts further right and is read without shifting.
        let ((a, a_pos), (b, b_pos)) = if position.x >= other_position.x {
            ((self, position), (other, other_position))
        } else {
            ((other, other_position), (self, position))
        };

        let a_row_start = intersection.y - a_pos.y;
        let b_row_start = intersection.y - b_pos.y;
        let b_offset_x = intersection.x - b_pos.x;
        let word_shift = (b_offset_x / WORD_BITS) as usize;
        let bit_shift = (b_offset_x % WORD_BITS) as u32;
        let a_words = ((intersection.width + WORD_BITS - 1) / WORD_BITS) as usize;

        for row in 0..intersection.height {
            let a_row = a_row_start + row;
            let b_row = b_row_start + row;
            for word_index in 0..a_words {
                let a_word = a.word(a_row, word_index);
                if a_word == 0 {
                    continue;
                }
                let b_word = b.word(b_row, word_shift + word_index);
                let b_next = b.word(b_row, word_shift + word_index + 1);
                let hit = if bit_shift == 0 {
                    a_word & b_word
                } else {
                    ((a_word >> bit_shift) & b_word) | (a_word & (b_next >> (32 - bit_shift)))
                };
                if hit != 0 {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: i32, height: i32) -> PixelMask {
        PixelMask::from_fn(width, height, |_, _| true)
    }

    fn single(width: i32, height: i32, x: i32, y: i32) -> PixelMask {
        PixelMask::from_fn(width, height, |column, row| column == x && row == y)
    }

    fn both_ways(a: &PixelMask, pa: Point, b: &PixelMask, pb: Point) -> bool {
        let forward = a.test_collision(pa, b, pb);
        let backward = b.test_collision(pb, a, pa);
        assert_eq!(forward, backward, "asymmetric result for {pa:?} vs {pb:?}");
        forward
    }

    /// Reference implementation: compares pixels one by one.
    fn naive(a: &PixelMask, pa: Point, b: &PixelMask, pb: Point) -> bool {
        for row in 0..a.height() {
            for column in 0..a.width() {
                if !a.is_opaque(column, row) {
                    continue;
                }
                let wx = pa.x + column;
                let wy = pa.y + row;
                if b.is_opaque(wx - pb.x, wy - pb.y) {
                    return true;
                }
            }
        }
        false
    }

    #[test]
    fn builds_mask_from_alpha_channel() {
        let mut image = RgbaImage::new(40, 4);
        image.put_pixel(1, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(35, 2, Rgba([0, 0, 0, 1]));
        image.put_pixel(3, 3, Rgba([10, 10, 10, 0]));
        let mask = PixelMask::from_image(&image, Rect::new(0, 0, 40, 4)).expect("mask");
        assert_eq!(mask.width(), 40);
        assert_eq!(mask.height(), 4);
        assert!(mask.is_opaque(1, 0));
        assert!(mask.is_opaque(35, 2));
        assert!(!mask.is_opaque(3, 3));
        assert!(!mask.is_opaque(0, 0));
    }

    #[test]
    fn sub_rectangle_is_relative_to_the_frame() {
        let mut image = RgbaImage::new(32, 16);
        image.put_pixel(17, 9, Rgba([0, 0, 0, 255]));
        let mask = PixelMask::from_image(&image, Rect::new(16, 8, 16, 8)).expect("mask");
        assert!(mask.is_opaque(1, 1));
        assert!(!mask.is_opaque(0, 0));
    }

    #[test]
    fn frame_outside_image_is_rejected() {
        let image = RgbaImage::new(16, 16);
        let err = PixelMask::from_image(&image, Rect::new(8, 8, 16, 16)).expect_err("err");
        assert!(matches!(err, SpriteError::FrameOutOfImage { .. }));
    }

    #[test]
    fn disjoint_boxes_never_collide() {
        let a = solid(16, 16);
        let b = solid(16, 16);
        assert!(!both_ways(&a, Point::new(0, 0), &b, Point::new(16, 0)));
        assert!(!both_ways(&a, Point::new(0, 0), &b, Point::new(0, 16)));
        assert!(both_ways(&a, Point::new(0, 0), &b, Point::new(15, 15)));
    }

    #[test]
    fn empty_masks_with_overlapping_boxes_do_not_collide() {
        let a = PixelMask::from_fn(16, 16, |_, _| false);
        let b = solid(16, 16);
        assert!(!both_ways(&a, Point::new(0, 0), &b, Point::new(4, 4)));
    }

    #[test]
    fn single_pixels_meet_across_word_boundaries() {
        let a = single(64, 4, 40, 2);
        let b = single(8, 4, 3, 2);
        assert!(both_ways(&a, Point::new(0, 0), &b, Point::new(37, 0)));
        assert!(!both_ways(&a, Point::new(0, 0), &b, Point::new(36, 0)));
        assert!(!both_ways(&a, Point::new(0, 0), &b, Point::new(37, 1)));
    }

    #[test]
    fn matches_pixel_by_pixel_reference() {
        let a = PixelMask::from_fn(45, 13, |column, row| (column * 7 + row * 3) % 11 == 0);
        let b = PixelMask::from_fn(70, 9, |column, row| (column + row * 5) % 13 == 0);
        for dy in -14..14 {
            for dx in -72..48 {
                let pa = Point::new(5, 5);
                let pb = Point::new(5 + dx, 5 + dy);
                let expected = naive(&a, pa, &b, pb);
                assert_eq!(both_ways(&a, pa, &b, pb), expected, "dx={dx} dy={dy}");
            }
        }
    }
}
