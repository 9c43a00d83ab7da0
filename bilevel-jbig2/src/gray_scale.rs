//! Gray-scale image decoding procedure (Annex C).

use crate::arithmetic_decoder::{ArithmeticDecoder, Contexts};
use crate::bitmap::{Bitmap, MAX_PIXELS};
use crate::decode::generic::{GenericParams, decode_arithmetic, decode_mmr};
use crate::decode::{AtPixel, Template};
use crate::error::{DecodeError, RegionError, Result, bail};

/// Input parameters to the gray-scale image decoding procedure (Table C.1).
pub(crate) struct GrayScaleParams<'a> {
    /// "GSMMR"
    pub(crate) mmr: bool,
    /// "GSBPP", the number of bit-planes.
    pub(crate) bits_per_pixel: u32,
    /// "GSW"
    pub(crate) width: u32,
    /// "GSH"
    pub(crate) height: u32,
    /// "GSTEMPLATE"
    pub(crate) template: Template,
    /// "GSKIP", when "GSUSESKIP" is 1.
    pub(crate) skip: Option<&'a Bitmap>,
}

/// Decode "GSVALS", the gray-scale values in row-major order (C.5).
pub(crate) fn decode(data: &[u8], params: &GrayScaleParams<'_>) -> Result<Vec<u32>> {
    if u64::from(params.width) * u64::from(params.height) > MAX_PIXELS {
        bail!(RegionError::TooLarge);
    }

    let size = (params.width as usize)
        .checked_mul(params.height as usize)
        .ok_or(DecodeError::Overflow)?;
    let mut values = vec![0_u32; size];

    if params.bits_per_pixel == 0 {
        return Ok(values);
    }

    if params.bits_per_pixel > 32 {
        return Err(DecodeError::Overflow);
    }

    let mut planes = PlaneSource::new(data, params);
    let mut previous: Option<Bitmap> = None;

    // Planes arrive from the most significant one down, each one Gray-coded
    // against the plane above it.
    for j in (0..params.bits_per_pixel).rev() {
        let mut plane = planes.next_plane()?;

        if let Some(above) = &previous {
            for (byte, above) in plane.data.iter_mut().zip(&above.data) {
                *byte ^= above;
            }
        }

        for y in 0..params.height {
            for x in 0..params.width {
                if plane.get_pixel(x, y) {
                    values[(y * params.width + x) as usize] |= 1 << j;
                }
            }
        }

        previous = Some(plane);
    }

    Ok(values)
}

/// Decodes consecutive bit-planes, sharing coder state between them (Table C.4).
enum PlaneSource<'a> {
    Mmr {
        data: &'a [u8],
        offset: usize,
        width: u32,
        height: u32,
    },
    Arithmetic {
        decoder: ArithmeticDecoder<'a>,
        contexts: Contexts,
        template: Template,
        at_pixels: Vec<AtPixel>,
        skip: Option<&'a Bitmap>,
        width: u32,
        height: u32,
    },
}

impl<'a> PlaneSource<'a> {
    fn new(data: &'a [u8], params: &GrayScaleParams<'a>) -> Self {
        if params.mmr {
            return Self::Mmr {
                data,
                offset: 0,
                width: params.width,
                height: params.height,
            };
        }

        let at_pixels = match params.template {
            Template::Template0 => vec![
                AtPixel::new(3, -1),
                AtPixel::new(-3, -1),
                AtPixel::new(2, -2),
                AtPixel::new(-2, -2),
            ],
            Template::Template1 => vec![AtPixel::new(3, -1)],
            Template::Template2 | Template::Template3 => vec![AtPixel::new(2, -1)],
        };

        Self::Arithmetic {
            decoder: ArithmeticDecoder::new(data),
            contexts: Contexts::new(params.template.context_bits()),
            template: params.template,
            at_pixels,
            skip: params.skip,
            width: params.width,
            height: params.height,
        }
    }

    fn next_plane(&mut self) -> Result<Bitmap> {
        match self {
            Self::Mmr {
                data,
                offset,
                width,
                height,
            } => {
                let mut plane = Bitmap::new(*width, *height)?;
                let rest = data.get(*offset..).unwrap_or_default();
                *offset += decode_mmr(&mut plane, rest)?;

                Ok(plane)
            }
            Self::Arithmetic {
                decoder,
                contexts,
                template,
                at_pixels,
                skip,
                width,
                height,
            } => {
                let mut plane = Bitmap::new(*width, *height)?;
                decode_arithmetic(
                    &mut plane,
                    decoder,
                    contexts,
                    &GenericParams {
                        template: *template,
                        tpgdon: false,
                        at_pixels: at_pixels.as_slice(),
                        skip: *skip,
                    },
                );

                Ok(plane)
            }
        }
    }
}
