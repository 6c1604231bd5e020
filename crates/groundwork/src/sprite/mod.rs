mod pixel_mask;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use image::{ImageReader, RgbaImage};
use thiserror::Error;

use crate::geometry::{Point, Rect};

pub use pixel_mask::PixelMask;

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("frame {frame:?} lies outside the {image_width}x{image_height} source image")]
    FrameOutOfImage {
        frame: Rect,
        image_width: u32,
        image_height: u32,
    },
    #[error("animation {animation} has no frames in direction {direction}")]
    NoFrames { animation: String, direction: usize },
    #[error("sprite {sprite} has no animation named {animation}")]
    UnknownAnimation { sprite: String, animation: String },
    #[error("animation {animation} has no direction {direction}")]
    UnknownDirection { animation: String, direction: usize },
    #[error("failed to open sprite image {path}: {source}")]
    ImageOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode sprite image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Decodes a sprite sheet into an RGBA buffer.
pub fn load_sprite_image(path: &Path) -> Result<RgbaImage, SpriteError> {
    let reader = ImageReader::open(path).map_err(|source| SpriteError::ImageOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| SpriteError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoded.to_rgba8())
}

#[derive(Debug)]
pub struct SpriteDirection {
    origin: Point,
    frames: Vec<Rect>,
    masks: Vec<OnceLock<PixelMask>>,
}

impl SpriteDirection {
    pub fn new(origin: Point, frames: Vec<Rect>) -> Self {
        let masks = frames.iter().map(|_| OnceLock::new()).collect();
        Self {
            origin,
            frames,
            masks,
        }
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn frames(&self) -> &[Rect] {
        &self.frames
    }
}

#[derive(Debug)]
pub struct SpriteAnimation {
    directions: Vec<SpriteDirection>,
    frame_delay_ms: u64,
    loop_on_frame: Option<usize>,
}

impl SpriteAnimation {
    /// `frame_delay_ms == 0` means the animation never advances on its own.
    pub fn new(
        directions: Vec<SpriteDirection>,
        frame_delay_ms: u64,
        loop_on_frame: Option<usize>,
    ) -> Self {
        Self {
            directions,
            frame_delay_ms,
            loop_on_frame,
        }
    }

    pub fn direction_count(&self) -> usize {
        self.directions.len()
    }

    fn frame_count(&self, direction: usize) -> usize {
        self.directions
            .get(direction)
            .map_or(0, |direction| direction.frames.len())
    }
}

/// Source image plus named animations. Pixel masks are built per frame on
/// first use and kept for the lifetime of the set.
#[derive(Debug)]
pub struct SpriteAnimationSet {
    id: String,
    image: RgbaImage,
    animations: BTreeMap<String, SpriteAnimation>,
    default_animation: Option<String>,
}

impl SpriteAnimationSet {
    pub fn new(id: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            id: id.into(),
            image,
            animations: BTreeMap::new(),
            default_animation: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adds an animation after checking every frame against the image. The
    /// first animation added becomes the default one.
    pub fn with_animation(
        mut self,
        name: impl Into<String>,
        animation: SpriteAnimation,
    ) -> Result<Self, SpriteError> {
        let name = name.into();
        let bounds = Rect::new(0, 0, self.image.width() as i32, self.image.height() as i32);
        for (index, direction) in animation.directions.iter().enumerate() {
            if direction.frames.is_empty() {
                return Err(SpriteError::NoFrames {
                    animation: name,
                    direction: index,
                });
            }
            if let Some(frame) = direction
                .frames
                .iter()
                .find(|frame| frame.is_empty() || !bounds.contains_rect(frame))
            {
                return Err(SpriteError::FrameOutOfImage {
                    frame: *frame,
                    image_width: self.image.width(),
                    image_height: self.image.height(),
                });
            }
        }
        if self.default_animation.is_none() {
            self.default_animation = Some(name.clone());
        }
        self.animations.insert(name, animation);
        Ok(self)
    }

    pub fn animation(&self, name: &str) -> Option<&SpriteAnimation> {
        self.animations.get(name)
    }

    pub fn default_animation(&self) -> Option<&str> {
        self.default_animation.as_deref()
    }

    pub fn mask(&self, animation: &str, direction: usize, frame: usize) -> Option<&PixelMask> {
        let direction = self.animations.get(animation)?.directions.get(direction)?;
        let source = *direction.frames.get(frame)?;
        let slot = direction.masks.get(frame)?;
        if let Some(mask) = slot.get() {
            return Some(mask);
        }
        // Frames were checked against the image in `with_animation`.
        let mask = PixelMask::from_image(&self.image, source).ok()?;
        Some(slot.get_or_init(|| mask))
    }

    #[cfg(test)]
    fn built_mask_count(&self) -> usize {
        self.animations
            .values()
            .flat_map(|animation| animation.directions.iter())
            .flat_map(|direction| direction.masks.iter())
            .filter(|slot| slot.get().is_some())
            .count()
    }
}

/// One animated instance of a sprite animation set.
#[derive(Debug, Clone)]
pub struct Sprite {
    animation_set: Arc<SpriteAnimationSet>,
    animation: String,
    direction: usize,
    frame: usize,
    next_frame_date: u64,
    finished: bool,
    pixel_collisions: bool,
    suspended: bool,
    when_suspended: u64,
}

impl Sprite {
    pub fn new(animation_set: Arc<SpriteAnimationSet>, now: u64) -> Result<Self, SpriteError> {
        let animation = animation_set
            .default_animation()
            .map(str::to_string)
            .ok_or_else(|| SpriteError::UnknownAnimation {
                sprite: animation_set.id().to_string(),
                animation: "<default>".to_string(),
            })?;
        let mut sprite = Self {
            animation_set,
            animation: String::new(),
            direction: 0,
            frame: 0,
            next_frame_date: now,
            finished: false,
            pixel_collisions: false,
            suspended: false,
            when_suspended: 0,
        };
        sprite.set_animation(&animation, now)?;
        Ok(sprite)
    }

    pub fn animation_set(&self) -> &Arc<SpriteAnimationSet> {
        &self.animation_set
    }

    pub fn animation_name(&self) -> &str {
        &self.animation
    }

    pub fn direction(&self) -> usize {
        self.direction
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn is_animation_finished(&self) -> bool {
        self.finished
    }

    fn current_animation(&self) -> Option<&SpriteAnimation> {
        self.animation_set.animation(&self.animation)
    }

    pub fn set_animation(&mut self, name: &str, now: u64) -> Result<(), SpriteError> {
        let Some(animation) = self.animation_set.animation(name) else {
            return Err(SpriteError::UnknownAnimation {
                sprite: self.animation_set.id().to_string(),
                animation: name.to_string(),
            });
        };
        let delay = animation.frame_delay_ms;
        let direction_count = animation.direction_count();
        self.animation = name.to_string();
        if self.direction >= direction_count {
            self.direction = 0;
        }
        self.frame = 0;
        self.finished = false;
        self.next_frame_date = now + delay;
        Ok(())
    }

    pub fn set_direction(&mut self, direction: usize) -> Result<(), SpriteError> {
        let count = self.current_animation().map_or(0, SpriteAnimation::direction_count);
        if direction >= count {
            return Err(SpriteError::UnknownDirection {
                animation: self.animation.clone(),
                direction,
            });
        }
        self.direction = direction;
        let frames = self.current_animation().map_or(0, |a| a.frame_count(direction));
        if self.frame >= frames {
            self.frame = 0;
        }
        Ok(())
    }

    pub fn are_pixel_collisions_enabled(&self) -> bool {
        self.pixel_collisions
    }

    pub fn set_pixel_collisions_enabled(&mut self, enabled: bool) {
        self.pixel_collisions = enabled;
    }

    pub fn origin(&self) -> Point {
        self.current_animation()
            .and_then(|animation| animation.directions.get(self.direction))
            .map_or(Point::ZERO, SpriteDirection::origin)
    }

    pub fn current_mask(&self) -> Option<&PixelMask> {
        self.animation_set
            .mask(&self.animation, self.direction, self.frame)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        if suspended == self.suspended {
            return;
        }
        self.suspended = suspended;
        if suspended {
            self.when_suspended = now;
        } else {
            self.next_frame_date += now.saturating_sub(self.when_suspended);
        }
    }

    /// Advances the animation; returns whether the displayed frame changed.
    pub fn update(&mut self, now: u64) -> bool {
        if self.suspended || self.finished {
            return false;
        }
        let Some(animation) = self.animation_set.animation(&self.animation) else {
            return false;
        };
        let delay = animation.frame_delay_ms;
        let frame_count = animation.frame_count(self.direction);
        let loop_on_frame = animation.loop_on_frame;
        if delay == 0 || frame_count == 0 {
            return false;
        }

        let mut changed = false;
        while !self.finished && now >= self.next_frame_date {
            let next = self.frame + 1;
            if next < frame_count {
                self.frame = next;
                changed = true;
            } else if let Some(loop_frame) = loop_on_frame.filter(|frame| *frame < frame_count) {
                changed |= self.frame != loop_frame;
                self.frame = loop_frame;
            } else {
                self.finished = true;
            }
            self.next_frame_date += delay;
        }
        changed
    }

    /// Pixel-exact test between two sprites drawn at the given anchor points.
    /// Both sprites need pixel collisions enabled.
    pub fn test_collision(&self, anchor: Point, other: &Sprite, other_anchor: Point) -> bool {
        if !self.pixel_collisions || !other.pixel_collisions {
            return false;
        }
        let (Some(mask), Some(other_mask)) = (self.current_mask(), other.current_mask()) else {
            return false;
        };
        mask.test_collision(
            anchor - self.origin(),
            other_mask,
            other_anchor - other.origin(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sheet() -> RgbaImage {
        let mut image = RgbaImage::new(32, 16);
        for y in 0..16 {
            for x in 0..16 {
                image.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        image.put_pixel(20, 4, Rgba([255, 0, 0, 255]));
        image
    }

    fn walking_set() -> Arc<SpriteAnimationSet> {
        let walking = SpriteAnimation::new(
            vec![SpriteDirection::new(
                Point::new(8, 13),
                vec![Rect::new(0, 0, 16, 16), Rect::new(16, 0, 16, 16)],
            )],
            100,
            Some(0),
        );
        let stopped = SpriteAnimation::new(
            vec![SpriteDirection::new(
                Point::new(8, 13),
                vec![Rect::new(0, 0, 16, 16)],
            )],
            0,
            None,
        );
        Arc::new(
            SpriteAnimationSet::new("hero/tunic", sheet())
                .with_animation("walking", walking)
                .expect("walking")
                .with_animation("stopped", stopped)
                .expect("stopped"),
        )
    }

    #[test]
    fn frames_outside_the_sheet_are_rejected() {
        let animation = SpriteAnimation::new(
            vec![SpriteDirection::new(Point::ZERO, vec![Rect::new(24, 0, 16, 16)])],
            0,
            None,
        );
        let err = SpriteAnimationSet::new("bad", sheet())
            .with_animation("broken", animation)
            .expect_err("err");
        assert!(matches!(err, SpriteError::FrameOutOfImage { .. }));
    }

    #[test]
    fn masks_are_built_lazily_once() {
        let set = walking_set();
        assert_eq!(set.built_mask_count(), 0);
        let first = set.mask("walking", 0, 1).expect("mask") as *const PixelMask;
        let again = set.mask("walking", 0, 1).expect("mask") as *const PixelMask;
        assert_eq!(first, again);
        assert_eq!(set.built_mask_count(), 1);
        assert!(set.mask("walking", 0, 2).is_none());
        assert!(set.mask("walking", 1, 0).is_none());
    }

    #[test]
    fn lazy_mask_is_read_from_the_frame_pixels() {
        let set = walking_set();
        let mask = set.mask("walking", 0, 1).expect("mask");
        let expected = PixelMask::from_image(&sheet(), Rect::new(16, 0, 16, 16)).expect("mask");
        assert_eq!(*mask, expected);
        assert!(mask.is_opaque(4, 4));
        assert!(!mask.is_opaque(0, 0));
    }

    #[test]
    fn animation_loops_on_configured_frame() {
        let mut sprite = Sprite::new(walking_set(), 0).expect("sprite");
        assert_eq!(sprite.animation_name(), "walking");
        assert!(!sprite.update(99));
        assert!(sprite.update(100));
        assert_eq!(sprite.frame(), 1);
        assert!(sprite.update(200));
        assert_eq!(sprite.frame(), 0);
        assert!(!sprite.is_animation_finished());
    }

    #[test]
    fn suspension_delays_next_frame() {
        let mut sprite = Sprite::new(walking_set(), 0).expect("sprite");
        sprite.set_suspended(true, 50);
        assert!(!sprite.update(500));
        sprite.set_suspended(false, 550);
        assert!(!sprite.update(599));
        assert!(sprite.update(600));
    }

    #[test]
    fn unknown_animation_and_direction_are_errors() {
        let mut sprite = Sprite::new(walking_set(), 0).expect("sprite");
        assert!(matches!(
            sprite.set_animation("swimming", 0),
            Err(SpriteError::UnknownAnimation { .. })
        ));
        assert!(matches!(
            sprite.set_direction(3),
            Err(SpriteError::UnknownDirection { .. })
        ));
    }

    #[test]
    fn sprite_collision_requires_pixel_collisions_on_both_sides() {
        let set = walking_set();
        let mut a = Sprite::new(Arc::clone(&set), 0).expect("a");
        let mut b = Sprite::new(set, 0).expect("b");
        let anchor = Point::new(40, 40);
        assert!(!a.test_collision(anchor, &b, anchor));
        a.set_pixel_collisions_enabled(true);
        assert!(!a.test_collision(anchor, &b, anchor));
        b.set_pixel_collisions_enabled(true);
        assert!(a.test_collision(anchor, &b, anchor));
        assert!(!a.test_collision(anchor, &b, Point::new(56, 40)));
    }

    #[test]
    fn sparse_frame_only_collides_on_its_opaque_pixel() {
        let mut a = Sprite::new(walking_set(), 0).expect("a");
        let mut b = Sprite::new(walking_set(), 0).expect("b");
        a.set_pixel_collisions_enabled(true);
        b.set_pixel_collisions_enabled(true);
        assert!(a.update(100));
        // Frame 1 has a single opaque pixel at (4, 4) relative to its frame.
        let anchor = Point::new(100, 100);
        let pixel_world = anchor - a.origin() + Point::new(4, 4);
        let b_anchor_hit = pixel_world + b.origin() - Point::new(15, 15);
        let b_anchor_miss = pixel_world + b.origin() + Point::new(1, 0);
        assert!(a.test_collision(anchor, &b, b_anchor_hit));
        assert!(!a.test_collision(anchor, &b, b_anchor_miss));
    }

    #[test]
    fn loads_png_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sheet.png");
        sheet().save(&path).expect("save png");
        let loaded = load_sprite_image(&path).expect("load");
        assert_eq!(loaded.dimensions(), (32, 16));
        assert_eq!(loaded.get_pixel(20, 4).0[3], 255);

        let missing = load_sprite_image(&dir.path().join("missing.png")).expect_err("err");
        assert!(matches!(missing, SpriteError::ImageOpen { .. }));
    }
}
