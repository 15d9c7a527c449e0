//! Turns arbitrarily sized card, booster and box photos into fixed-size RGBA textures.
//!
//! Every transform is pure and deterministic, so running the pipeline over its own output
//! leaves the bytes untouched.

use std::str::FromStr;

use image::{imageops, DynamicImage, RgbaImage};
use image::imageops::FilterType;

pub use batch::{normalize_directory, BatchOptions, BatchReport};

pub mod batch;

pub const DEFAULT_WHITE_THRESHOLD: u8 = 240;
pub const CROP_PADDING: u32 = 2;
pub const BOOSTER_ASPECT_RATIO: f32 = 0.565;
const ASPECT_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Centered,
    /// Horizontally centered, glued to the top edge.
    TopAnchored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSize {
    Fixed { width: u32, height: u32 },
    NextPowerOfTwo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Whole source visible, transparent bars fill the rest.
    Contain,
    /// Canvas fully covered, overflow cropped from the center.
    Cover,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSpec {
    pub target: TargetSize,
    pub margin: u32,
    pub fit: FitMode,
    pub placement: Placement,
    pub background_threshold: Option<u8>,
    pub auto_crop: bool,
    pub aspect_ratio: Option<f32>,
}

impl TextureSpec {
    pub fn card() -> Self {
        Self {
            target: TargetSize::Fixed { width: 256, height: 256 },
            margin: 0,
            fit: FitMode::Contain,
            placement: Placement::TopAnchored,
            background_threshold: None,
            auto_crop: false,
            aspect_ratio: None,
        }
    }

    pub fn padded_card() -> Self {
        Self {
            margin: 10,
            placement: Placement::Centered,
            ..Self::card()
        }
    }

    pub fn booster() -> Self {
        Self {
            target: TargetSize::Fixed { width: 32, height: 48 },
            margin: 0,
            fit: FitMode::Cover,
            placement: Placement::Centered,
            background_threshold: Some(DEFAULT_WHITE_THRESHOLD),
            auto_crop: true,
            aspect_ratio: Some(BOOSTER_ASPECT_RATIO),
        }
    }

    pub fn power_of_two() -> Self {
        Self {
            target: TargetSize::NextPowerOfTwo,
            ..Self::card()
        }
    }

    pub fn etb_face() -> Self {
        Self {
            target: TargetSize::Fixed { width: 64, height: 64 },
            margin: 0,
            fit: FitMode::Contain,
            placement: Placement::Centered,
            background_threshold: Some(DEFAULT_WHITE_THRESHOLD),
            auto_crop: true,
            aspect_ratio: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.target = TargetSize::Fixed { width, height };
        self
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    /// Final dimensions for a source of the given size.
    pub fn target_dimensions(&self, (width, height): (u32, u32)) -> (u32, u32) {
        match self.target {
            TargetSize::Fixed { width, height } => (width, height),
            TargetSize::NextPowerOfTwo => (next_power_of_two(width), next_power_of_two(height)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Card,
    PaddedCard,
    Booster,
    PowerOfTwo,
    EtbFace,
}

impl Preset {
    pub fn spec(&self) -> TextureSpec {
        match self {
            Preset::Card => TextureSpec::card(),
            Preset::PaddedCard => TextureSpec::padded_card(),
            Preset::Booster => TextureSpec::booster(),
            Preset::PowerOfTwo => TextureSpec::power_of_two(),
            Preset::EtbFace => TextureSpec::etb_face(),
        }
    }
}

impl FromStr for Preset {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "padded-card" => Ok(Self::PaddedCard),
            "booster" => Ok(Self::Booster),
            "power-of-two" => Ok(Self::PowerOfTwo),
            "etb-face" => Ok(Self::EtbFace),
            _ => Err("Invalid preset. Options: card, padded-card, booster, power-of-two, etb-face")
        }
    }
}

pub fn next_power_of_two(value: u32) -> u32 {
    value.max(1).next_power_of_two()
}

/// Runs the full pipeline for one decoded image.
pub fn normalize_texture(source: &DynamicImage, spec: &TextureSpec) -> RgbaImage {
    let source_dimensions = (source.width(), source.height());
    let (target_width, target_height) = spec.target_dimensions(source_dimensions);

    if source_dimensions == (target_width, target_height) {
        return source.to_rgba8();
    }

    let mut image = source.to_rgba8();

    if let Some(threshold) = spec.background_threshold {
        image = remove_near_white_background(&image, threshold);
    }

    if spec.auto_crop {
        image = auto_crop_to_content(&image, spec.background_threshold.unwrap_or(DEFAULT_WHITE_THRESHOLD));
    }

    if let Some(aspect_ratio) = spec.aspect_ratio {
        image = crop_to_aspect(&image, aspect_ratio);
    }

    match (spec.target, spec.fit) {
        (TargetSize::NextPowerOfTwo, _) => to_power_of_two(&image, spec.placement),
        (TargetSize::Fixed { width, height }, FitMode::Contain) => fit_with_padding(&image, width, height, spec.margin, spec.placement),
        (TargetSize::Fixed { width, height }, FitMode::Cover) => fit_with_cover(&image, width, height),
    }
}

fn is_near_white(pixel: &image::Rgba<u8>, threshold: u8) -> bool {
    pixel[0] > threshold && pixel[1] > threshold && pixel[2] > threshold
}

pub fn remove_near_white_background(image: &RgbaImage, threshold: u8) -> RgbaImage {
    let mut output = image.clone();

    for pixel in output.pixels_mut() {
        if is_near_white(pixel, threshold) {
            pixel[3] = 0;
        }
    }

    output
}

/// Crops to the visible, non-white content plus [`CROP_PADDING`]. Images without any content come back unchanged.
pub fn auto_crop_to_content(image: &RgbaImage, threshold: u8) -> RgbaImage {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 || is_near_white(pixel, threshold) {
            continue;
        }

        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y)),
        });
    }

    let Some((min_x, min_y, max_x, max_y)) = bounds else {
        return image.clone();
    };

    let left = min_x.saturating_sub(CROP_PADDING);
    let top = min_y.saturating_sub(CROP_PADDING);
    let right = (max_x + CROP_PADDING + 1).min(image.width());
    let bottom = (max_y + CROP_PADDING + 1).min(image.height());

    imageops::crop_imm(image, left, top, right - left, bottom - top).to_image()
}

/// Trims the source to `width / height == ratio`: wide images lose both sides, tall images lose their bottom.
pub fn crop_to_aspect(image: &RgbaImage, ratio: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let current_ratio = width as f32 / height as f32;

    if (current_ratio - ratio).abs() < ASPECT_TOLERANCE {
        return image.clone();
    }

    if current_ratio > ratio {
        let new_width = ((height as f32 * ratio).round() as u32).clamp(1, width);
        let left = (width - new_width) / 2;

        imageops::crop_imm(image, left, 0, new_width, height).to_image()
    } else {
        let new_height = ((width as f32 / ratio).round() as u32).clamp(1, height);

        imageops::crop_imm(image, 0, 0, width, new_height).to_image()
    }
}

/// Size of `source` scaled uniformly to fit inside `bounds`, floored, never below 1px.
pub fn contained_size((source_width, source_height): (u32, u32), (bound_width, bound_height): (u32, u32)) -> (u32, u32) {
    let (source_width, source_height) = (source_width.max(1) as u64, source_height.max(1) as u64);
    let (bound_width, bound_height) = (bound_width.max(1) as u64, bound_height.max(1) as u64);

    // Compare bound_width / source_width against bound_height / source_height without floats.
    let (width, height) = if bound_width * source_height <= bound_height * source_width {
        (bound_width, source_height * bound_width / source_width)
    } else {
        (source_width * bound_height / source_height, bound_height)
    };

    (width.max(1) as u32, height.max(1) as u32)
}

pub fn fit_with_padding(image: &RgbaImage, target_width: u32, target_height: u32, margin: u32, placement: Placement) -> RgbaImage {
    let inner_bounds = (target_width.saturating_sub(margin), target_height.saturating_sub(margin));
    let (new_width, new_height) = contained_size(image.dimensions(), inner_bounds);

    let scaled = if (new_width, new_height) == image.dimensions() {
        image.clone()
    } else {
        imageops::resize(image, new_width, new_height, FilterType::Lanczos3)
    };

    place_on_canvas(&scaled, target_width, target_height, placement)
}

pub fn fit_with_cover(image: &RgbaImage, target_width: u32, target_height: u32) -> RgbaImage {
    let (source_width, source_height) = (image.width() as u64, image.height() as u64);
    let (width, height) = (target_width as u64, target_height as u64);

    let (new_width, new_height) = if width * source_height >= height * source_width {
        (width, (source_height * width).div_ceil(source_width))
    } else {
        ((source_width * height).div_ceil(source_height), height)
    };

    let scaled = imageops::resize(image, new_width as u32, new_height as u32, FilterType::Lanczos3);
    let left = (scaled.width() - target_width) / 2;
    let top = (scaled.height() - target_height) / 2;

    imageops::crop_imm(&scaled, left, top, target_width, target_height).to_image()
}

pub fn to_power_of_two(image: &RgbaImage, placement: Placement) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (target_width, target_height) = (next_power_of_two(width), next_power_of_two(height));

    if (width, height) == (target_width, target_height) {
        return image.clone();
    }

    place_on_canvas(image, target_width, target_height, placement)
}

fn place_on_canvas(image: &RgbaImage, width: u32, height: u32, placement: Placement) -> RgbaImage {
    let mut canvas = RgbaImage::new(width, height);

    let x = width.saturating_sub(image.width()) / 2;
    let y = match placement {
        Placement::Centered => height.saturating_sub(image.height()) / 2,
        Placement::TopAnchored => 0,
    };

    imageops::replace(&mut canvas, image, x as i64, y as i64);

    canvas
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    const RED: Rgba<u8> = Rgba([200, 10, 10, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(width, height, color)
    }

    fn content_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
        image.enumerate_pixels()
            .filter(|(_, _, pixel)| pixel[3] > 0)
            .fold(None, |bounds, (x, y, _)| Some(match bounds {
                None => (x, y, x, y),
                Some((a, b, c, d)) => (a.min(x), b.min(y), c.max(x), d.max(y)),
            }))
    }

    #[test]
    fn narrow_card_is_padded_left_and_right() {
        let card = solid(183, 256, RED);

        let output = fit_with_padding(&card, 256, 256, 0, Placement::Centered);

        assert_eq!(output.dimensions(), (256, 256));
        assert_eq!(content_bounds(&output), Some((36, 0, 36 + 182, 255)));
        assert_eq!(output.get_pixel(35, 100)[3], 0);
        assert_eq!(*output.get_pixel(36, 0), RED);
        assert_eq!(output.get_pixel(36 + 183, 100)[3], 0);
    }

    #[test]
    fn card_preset_anchors_to_top() {
        let card = solid(200, 100, RED);

        let output = normalize_texture(&DynamicImage::ImageRgba8(card), &TextureSpec::card());

        let (_, top, _, bottom) = content_bounds(&output).unwrap();
        assert_eq!(output.dimensions(), (256, 256));
        assert_eq!(top, 0);
        assert!(bottom < 255);
    }

    #[test]
    fn aspect_ratio_survives_scaling() {
        for (width, height) in [(367, 512), (600, 250), (250, 349), (1000, 1000), (7, 300)] {
            let output = fit_with_padding(&solid(width, height, RED), 256, 256, 10, Placement::Centered);
            let (min_x, min_y, max_x, max_y) = content_bounds(&output).unwrap();
            let (content_width, content_height) = (max_x - min_x + 1, max_y - min_y + 1);

            let expected_height = content_width as f64 * height as f64 / width as f64;
            let expected_width = content_height as f64 * width as f64 / height as f64;

            assert!(
                (content_height as f64 - expected_height).abs() <= 1.0 || (content_width as f64 - expected_width).abs() <= 1.0,
                "{width}x{height} became {content_width}x{content_height}"
            );
            assert!(content_width <= 246 && content_height <= 246);
        }
    }

    #[test]
    fn already_sized_texture_is_left_alone() {
        let mut texture = solid(256, 256, RED);
        texture.put_pixel(3, 4, Rgba([1, 2, 3, 4]));

        let once = normalize_texture(&DynamicImage::ImageRgba8(texture.clone()), &TextureSpec::padded_card());
        let twice = normalize_texture(&DynamicImage::ImageRgba8(once.clone()), &TextureSpec::padded_card());

        assert_eq!(once, texture);
        assert_eq!(twice, once);
    }

    #[test]
    fn normalizing_twice_matches_normalizing_once() {
        let source = DynamicImage::ImageRgba8(solid(367, 512, RED));

        for spec in [TextureSpec::card(), TextureSpec::padded_card(), TextureSpec::booster(), TextureSpec::power_of_two()] {
            let once = normalize_texture(&source, &spec);
            let twice = normalize_texture(&DynamicImage::ImageRgba8(once.clone()), &spec);

            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rgb_sources_come_out_as_rgba() {
        let source = DynamicImage::ImageRgb8(image::RgbImage::new(256, 256));

        let output = normalize_texture(&source, &TextureSpec::card());

        assert_eq!(output.dimensions(), (256, 256));
        assert_eq!(output.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn white_background_becomes_transparent() {
        let mut image = solid(4, 4, WHITE);
        image.put_pixel(1, 1, RED);
        image.put_pixel(2, 2, Rgba([241, 241, 240, 255]));

        let output = remove_near_white_background(&image, DEFAULT_WHITE_THRESHOLD);

        assert_eq!(output.get_pixel(0, 0), &Rgba([255, 255, 255, 0]));
        assert_eq!(output.get_pixel(1, 1), &RED);
        assert_eq!(output.get_pixel(2, 2)[3], 255);
    }

    #[test]
    fn auto_crop_keeps_padding_around_content() {
        let mut image = solid(50, 40, WHITE);
        for x in 10..20 {
            for y in 5..15 {
                image.put_pixel(x, y, RED);
            }
        }

        let output = auto_crop_to_content(&image, DEFAULT_WHITE_THRESHOLD);

        assert_eq!(output.dimensions(), (10 + 2 * CROP_PADDING, 10 + 2 * CROP_PADDING));
    }

    #[test]
    fn auto_crop_clamps_at_the_edges() {
        let mut image = solid(10, 10, WHITE);
        image.put_pixel(0, 9, RED);

        let output = auto_crop_to_content(&image, DEFAULT_WHITE_THRESHOLD);

        assert_eq!(output.dimensions(), (1 + CROP_PADDING, 1 + CROP_PADDING));
    }

    #[test]
    fn auto_crop_never_produces_an_empty_image() {
        let white = solid(30, 20, WHITE);
        assert_eq!(auto_crop_to_content(&white, DEFAULT_WHITE_THRESHOLD), white);

        let transparent = RgbaImage::new(30, 20);
        assert_eq!(auto_crop_to_content(&transparent, DEFAULT_WHITE_THRESHOLD), transparent);

        let mut single = solid(30, 20, WHITE);
        single.put_pixel(15, 10, RED);
        let cropped = auto_crop_to_content(&single, DEFAULT_WHITE_THRESHOLD);
        assert!(cropped.width() > 0 && cropped.height() > 0);
    }

    #[test]
    fn power_of_two_pads_width() {
        let output = to_power_of_two(&solid(183, 256, RED), Placement::TopAnchored);

        assert_eq!(output.dimensions(), (256, 256));
        assert_eq!(content_bounds(&output), Some((36, 0, 218, 255)));

        let untouched = solid(128, 64, RED);
        assert_eq!(to_power_of_two(&untouched, Placement::TopAnchored), untouched);
    }

    #[test]
    fn wide_photo_is_cropped_to_booster_ratio() {
        let output = crop_to_aspect(&solid(200, 200, RED), BOOSTER_ASPECT_RATIO);
        assert_eq!(output.dimensions(), (113, 200));

        let tall = crop_to_aspect(&solid(100, 400, RED), BOOSTER_ASPECT_RATIO);
        assert_eq!(tall.dimensions(), (100, 177));
    }

    #[test]
    fn cover_fills_the_whole_canvas() {
        let output = fit_with_cover(&solid(90, 100, RED), 32, 48);

        assert_eq!(output.dimensions(), (32, 48));
        assert!(output.pixels().all(|pixel| pixel[3] > 0));
    }

    #[test]
    fn booster_photo_becomes_a_32_by_48_texture() {
        let mut photo = solid(300, 300, WHITE);
        for x in 100..200 {
            for y in 50..250 {
                photo.put_pixel(x, y, RED);
            }
        }

        let output = normalize_texture(&DynamicImage::ImageRgba8(photo), &TextureSpec::booster());

        assert_eq!(output.dimensions(), (32, 48));
    }

    #[test]
    fn presets_parse_from_cli_names() {
        assert_eq!("padded-card".parse::<Preset>(), Ok(Preset::PaddedCard));
        assert_eq!(Preset::PowerOfTwo.spec().target, TargetSize::NextPowerOfTwo);
        assert!("square".parse::<Preset>().is_err());
    }

    #[test]
    fn contained_size_floors_and_never_reaches_zero() {
        assert_eq!(contained_size((367, 512), (246, 246)), (176, 246));
        assert_eq!(contained_size((1000, 1), (16, 16)), (16, 1));
        assert_eq!(contained_size((183, 256), (256, 256)), (183, 256));
    }
}
