//! Выбор и декодирование иконки элемента трея.
//!
//! Порядок: IconPixmap → IconName → AttentionIconName → запасная иконка.
//! Никакого ввода-вывода, наличие иконки в теме спрашиваем у [`IconTheme`].

use crate::domain::icon_theme::IconTheme;
use crate::domain::models::{Bitmap, Pixmap, PropertyCache, RenderableIcon};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PixmapError {
    #[error("pixmap has non-positive size {width}x{height}")]
    BadDimensions { width: i32, height: i32 },

    #[error("pixmap data is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub struct IconResolver {
    theme: Arc<dyn IconTheme>,
}

impl IconResolver {
    pub fn new(theme: Arc<dyn IconTheme>) -> Self {
        Self { theme }
    }

    /// Всегда возвращает иконку: в худшем случае `RenderableIcon::Fallback`
    pub fn resolve(&self, cache: &PropertyCache, target_size: u32) -> RenderableIcon {
        // 1. IconPixmap
        match select_best_pixmap(&cache.icon_pixmaps, target_size) {
            Some(pixmap) => match decode_pixmap(pixmap).and_then(|bitmap| scale_to(bitmap, target_size)) {
                Ok(bitmap) => return RenderableIcon::Pixels(bitmap),
                Err(e) => debug!("Pixmap {}x{} rejected: {}", pixmap.width, pixmap.height, e),
            },
            None => debug!("No pixmap candidates"),
        }

        let theme_path = cache.icon_theme_path.as_deref();

        // 2. IconName
        if let Some(icon) = self.themed(cache.icon_name.as_deref(), theme_path, "IconName") {
            return icon;
        }

        // 3. AttentionIconName
        if let Some(icon) = self.themed(cache.attention_icon_name.as_deref(), theme_path, "AttentionIconName") {
            return icon;
        }

        debug!("Falling back to generic icon");
        RenderableIcon::Fallback
    }

    fn themed(&self, name: Option<&str>, theme_path: Option<&str>, field: &str) -> Option<RenderableIcon> {
        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!("{} is empty", field);
                return None;
            }
        };

        if !self.theme.has_icon(name, theme_path) {
            debug!("{} '{}' is not in the icon theme", field, name);
            return None;
        }

        Some(RenderableIcon::Named {
            name: name.to_string(),
            theme_path: theme_path.map(str::to_string),
        })
    }
}

/// Кандидат с минимальным |w - t| + |h - t|; при равенстве - первый
pub fn select_best_pixmap(pixmaps: &[Pixmap], target_size: u32) -> Option<&Pixmap> {
    let target = i64::from(target_size);
    pixmaps
        .iter()
        .min_by_key(|p| (i64::from(p.width) - target).abs() + (i64::from(p.height) - target).abs())
}

/// Проверяет размер данных и переводит ARGB (network order) в RGBA
pub fn decode_pixmap(pixmap: &Pixmap) -> Result<Bitmap, PixmapError> {
    if pixmap.width <= 0 || pixmap.height <= 0 {
        return Err(PixmapError::BadDimensions {
            width: pixmap.width,
            height: pixmap.height,
        });
    }

    let width = pixmap.width as usize;
    let height = pixmap.height as usize;
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or(PixmapError::BadDimensions {
            width: pixmap.width,
            height: pixmap.height,
        })?;

    if pixmap.bytes.len() != expected {
        return Err(PixmapError::SizeMismatch {
            expected,
            actual: pixmap.bytes.len(),
        });
    }

    let mut rgba = pixmap.bytes.clone();
    // A R G B -> R G B A
    for pixel in rgba.chunks_exact_mut(4) {
        pixel.rotate_left(1);
    }

    Ok(Bitmap {
        width: width as u32,
        height: height as u32,
        rgba,
    })
}

/// Приводит картинку к размеру `size x size` (билинейная интерполяция)
pub fn scale_to(bitmap: Bitmap, size: u32) -> Result<Bitmap, PixmapError> {
    if bitmap.width == size && bitmap.height == size {
        return Ok(bitmap);
    }

    let (width, height, actual) = (bitmap.width, bitmap.height, bitmap.rgba.len());
    let image = RgbaImage::from_raw(width, height, bitmap.rgba).ok_or(PixmapError::SizeMismatch {
        expected: width as usize * height as usize * 4,
        actual,
    })?;

    let scaled = imageops::resize(&image, size, size, FilterType::Triangle);
    Ok(Bitmap {
        width: size,
        height: size,
        rgba: scaled.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::icon_theme::EmptyIconTheme;
    use crate::domain::models::FALLBACK_ICON_NAME;
    use std::collections::HashSet;

    struct FixedTheme(HashSet<&'static str>);

    impl IconTheme for FixedTheme {
        fn has_icon(&self, name: &str, _extra_path: Option<&str>) -> bool {
            self.0.contains(name)
        }
    }

    fn theme(names: &[&'static str]) -> Arc<dyn IconTheme> {
        Arc::new(FixedTheme(names.iter().copied().collect()))
    }

    fn solid(size: i32, argb: [u8; 4]) -> Pixmap {
        let bytes = argb.repeat((size * size) as usize);
        Pixmap::new(size, size, bytes)
    }

    #[test]
    fn best_fit_prefers_first_of_equal_distance() {
        let pixmaps = vec![solid(16, [255; 4]), solid(32, [255; 4]), solid(48, [255; 4])];
        let best = select_best_pixmap(&pixmaps, 24).unwrap();
        assert_eq!(best.width, 16);

        let reversed = vec![solid(48, [255; 4]), solid(32, [255; 4]), solid(16, [255; 4])];
        let best = select_best_pixmap(&reversed, 24).unwrap();
        assert_eq!(best.width, 32);
    }

    #[test]
    fn best_fit_exact_match_wins() {
        let pixmaps = vec![solid(16, [255; 4]), solid(24, [255; 4]), solid(22, [255; 4])];
        assert_eq!(select_best_pixmap(&pixmaps, 24).unwrap().width, 24);
        assert!(select_best_pixmap(&[], 24).is_none());
    }

    #[test]
    fn argb_is_converted_to_rgba() {
        let pixmap = Pixmap::new(1, 2, vec![0x80, 0x10, 0x20, 0x30, 0xff, 0x01, 0x02, 0x03]);
        let bitmap = decode_pixmap(&pixmap).unwrap();
        assert_eq!(bitmap.rgba, vec![0x10, 0x20, 0x30, 0x80, 0x01, 0x02, 0x03, 0xff]);
        assert_eq!((bitmap.width, bitmap.height), (1, 2));
    }

    #[test]
    fn short_pixmap_is_rejected() {
        let pixmap = Pixmap::new(10, 10, vec![0; 10 * 10 * 4 - 1]);
        assert_eq!(
            decode_pixmap(&pixmap),
            Err(PixmapError::SizeMismatch { expected: 400, actual: 399 })
        );
        assert!(matches!(
            decode_pixmap(&Pixmap::new(0, 10, vec![])),
            Err(PixmapError::BadDimensions { .. })
        ));
        assert!(matches!(
            decode_pixmap(&Pixmap::new(-4, -4, vec![0; 64])),
            Err(PixmapError::BadDimensions { .. })
        ));
    }

    #[test]
    fn bad_pixmap_falls_through_to_icon_name() {
        let resolver = IconResolver::new(theme(&["telegram"]));
        let cache = PropertyCache {
            icon_pixmaps: vec![Pixmap::new(10, 10, vec![0; 100])],
            icon_name: Some("telegram".into()),
            ..Default::default()
        };
        assert_eq!(
            resolver.resolve(&cache, 10),
            RenderableIcon::Named { name: "telegram".into(), theme_path: None }
        );
    }

    #[test]
    fn exact_size_pixmap_is_not_scaled() {
        let resolver = IconResolver::new(Arc::new(EmptyIconTheme));
        let cache = PropertyCache {
            icon_pixmaps: vec![solid(24, [0xff, 0x11, 0x22, 0x33])],
            ..Default::default()
        };
        match resolver.resolve(&cache, 24) {
            RenderableIcon::Pixels(bitmap) => {
                assert_eq!((bitmap.width, bitmap.height), (24, 24));
                assert_eq!(&bitmap.rgba[..4], &[0x11, 0x22, 0x33, 0xff]);
            }
            other => panic!("expected pixels, got {:?}", other),
        }
    }

    #[test]
    fn other_size_pixmap_is_scaled_to_target() {
        let resolver = IconResolver::new(Arc::new(EmptyIconTheme));
        let cache = PropertyCache {
            icon_pixmaps: vec![solid(16, [0xff, 0x40, 0x80, 0xc0])],
            ..Default::default()
        };
        match resolver.resolve(&cache, 24) {
            RenderableIcon::Pixels(bitmap) => {
                assert_eq!((bitmap.width, bitmap.height), (24, 24));
                assert_eq!(bitmap.rgba.len(), 24 * 24 * 4);
                // Однотонная картинка остаётся однотонной
                assert!(bitmap.rgba.chunks_exact(4).all(|p| p == [0x40, 0x80, 0xc0, 0xff]));
            }
            other => panic!("expected pixels, got {:?}", other),
        }
    }

    #[test]
    fn upscaling_blends_neighbouring_pixels() {
        // Чёрный и белый пиксели, растягиваем до 4x4
        let src = Bitmap {
            width: 2,
            height: 1,
            rgba: vec![0, 0, 0, 255, 255, 255, 255, 255],
        };
        let scaled = scale_to(src, 4).unwrap();
        assert_eq!((scaled.width, scaled.height), (4, 4));

        let reds: Vec<u8> = scaled.rgba.chunks_exact(4).take(4).map(|p| p[0]).collect();
        assert!(reds[0] < reds[1] && reds[1] < reds[2] && reds[2] < reds[3]);
        assert!(reds[0] < 16 && reds[3] > 240);
    }

    #[test]
    fn inconsistent_bitmap_is_not_scaled() {
        let broken = Bitmap {
            width: 4,
            height: 4,
            rgba: vec![0; 10],
        };
        assert_eq!(
            scale_to(broken, 8),
            Err(PixmapError::SizeMismatch { expected: 64, actual: 10 })
        );
    }

    #[test]
    fn missing_icon_name_falls_through_to_attention_icon() {
        let resolver = IconResolver::new(theme(&["mail-unread"]));
        let cache = PropertyCache {
            icon_name: Some("not-in-theme".into()),
            attention_icon_name: Some("mail-unread".into()),
            icon_theme_path: Some("/opt/app/icons".into()),
            ..Default::default()
        };
        assert_eq!(
            resolver.resolve(&cache, 24),
            RenderableIcon::Named {
                name: "mail-unread".into(),
                theme_path: Some("/opt/app/icons".into()),
            }
        );
    }

    #[test]
    fn everything_missing_yields_fallback() {
        let resolver = IconResolver::new(Arc::new(EmptyIconTheme));
        let cache = PropertyCache {
            icon_name: Some(String::new()),
            attention_icon_name: Some(String::new()),
            ..Default::default()
        };
        let icon = resolver.resolve(&cache, 24);
        assert_eq!(icon, RenderableIcon::Fallback);
        assert_eq!(icon.icon_name(), Some(FALLBACK_ICON_NAME));

        assert_eq!(resolver.resolve(&PropertyCache::default(), 24), RenderableIcon::Fallback);
    }
}
