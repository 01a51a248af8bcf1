//! In-memory drawing surface over an `image` RGB buffer.
//!
//! The annotator draws text and bars with `embedded-graphics`; [`Canvas`]
//! exposes the photo as a `DrawTarget`, and [`Magnified`] scales anything
//! drawn through it so the compiled-in bitmap fonts reach photo-sized text.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use image::{Rgb, RgbImage};

/// RGB photo implementing `DrawTarget<Color = Rgb888>`.
///
/// Pixels outside the image are dropped.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    #[inline]
    fn set_pixel(&mut self, x: u32, y: u32, color: Rgb888) {
        self.image
            .put_pixel(x, y, Rgb([color.r(), color.g(), color.b()]));
    }

    /// Clamp a rectangle to the image, as half-open pixel ranges.
    fn clip(&self, area: &Rectangle) -> (core::ops::Range<u32>, core::ops::Range<u32>) {
        let (w, h) = self.image.dimensions();
        let clamp = |v: i64, max: u32| v.clamp(0, i64::from(max)) as u32;

        let x0 = i64::from(area.top_left.x);
        let y0 = i64::from(area.top_left.y);
        let x1 = x0 + i64::from(area.size.width);
        let y1 = y0 + i64::from(area.size.height);

        (clamp(x0, w)..clamp(x1, w), clamp(y0, h)..clamp(y1, h))
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = self.image.dimensions();

        for Pixel(coord, color) in pixels {
            if coord.x >= 0 && coord.y >= 0 && (coord.x as u32) < w && (coord.y as u32) < h {
                self.set_pixel(coord.x as u32, coord.y as u32, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let (xs, ys) = self.clip(area);
        for y in ys {
            for x in xs.clone() {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }
}

/// Draw target adapter that scales every pixel to a `factor`×`factor` block
/// placed at `origin + point * factor` on the wrapped target.
pub struct Magnified<'a, D> {
    target: &'a mut D,
    origin: Point,
    factor: u32,
}

impl<'a, D: DrawTarget> Magnified<'a, D> {
    pub fn new(target: &'a mut D, origin: Point, factor: u32) -> Self {
        Self {
            target,
            origin,
            factor: factor.max(1),
        }
    }
}

impl<D: DrawTarget> OriginDimensions for Magnified<'_, D> {
    fn size(&self) -> Size {
        let bounds = self.target.bounding_box();
        let span = |extent: u32, offset: i32| {
            (i64::from(extent) - i64::from(offset)).max(0) as u32 / self.factor
        };
        Size::new(
            span(bounds.size.width, self.origin.x),
            span(bounds.size.height, self.origin.y),
        )
    }
}

impl<D: DrawTarget> DrawTarget for Magnified<'_, D> {
    type Color = D::Color;
    type Error = D::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let block = Size::new_equal(self.factor);
        for Pixel(point, color) in pixels {
            let top_left = self.origin + point * self.factor as i32;
            self.target
                .fill_solid(&Rectangle::new(top_left, block), color)?;
        }
        Ok(())
    }
}
