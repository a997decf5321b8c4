// End to end runs through encoded images with embedded keys.

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use tilemend::exif::{self, ExifFields};
use tilemend::scramble::{scramble_to_bytes, seeded_rng};
use tilemend::{
    DescrambleError, DescrambleHook, DescramblingEngine, EngineConfig, ImageResponse,
    OutputFormat, PartialReconstruction, PermutationKey, RawImage, SchemeParameters,
};

fn tile_color(index: u32) -> Rgba<u8> {
    Rgba([(index % 10 * 25) as u8, (index / 10 * 16) as u8, 200, 255])
}

fn near(a: Rgba<u8>, b: Rgba<u8>, tolerance: u8) -> bool {
    a.0.iter().zip(b.0).all(|(&x, y)| x.abs_diff(y) <= tolerance)
}

fn with_exif(png: Vec<u8>, fields: &ExifFields) -> Vec<u8> {
    exif::embed(&png, ImageFormat::Png, &fields.to_tiff()).unwrap()
}

fn png(img: RgbaImage) -> Vec<u8> {
    OutputFormat::Png.encode(img).unwrap()
}

// 1000 x 1700 scrambled page: 10 x 15 flat tiles of 91 x 104 with 10 px
// black gaps, the last row and column running to the edge.
fn numbered_page() -> RgbaImage {
    let (bw, bh, gap) = (91, 104, 10);
    RgbaImage::from_fn(1000, 1700, |x, y| {
        let (c, r) = ((x / (bw + gap)).min(9), (y / (bh + gap)).min(14));
        if x - c * (bw + gap) >= bw && c < 9 || y - r * (bh + gap) >= bh && r < 14 {
            Rgba([0, 0, 0, 255])
        } else {
            tile_color(r * 10 + c)
        }
    })
}

fn identity_id() -> String {
    PermutationKey::identity(64).to_string()
}

fn center(img: &RgbaImage, c: u32, r: u32, bw: u32, bh: u32) -> Rgba<u8> {
    *img.get_pixel(c * bw + bw / 2, r * bh + bh / 2)
}

#[test]
fn identity_key_puts_every_tile_home() {
    let fields = ExifFields {
        dimensions: None,
        unique_id: Some(identity_id()),
    };
    assert!(identity_id().starts_with("0:1:2:"));
    assert!(identity_id().ends_with(":3e:3f"));

    let out = tilemend::descramble(with_exif(png(numbered_page()), &fields)).unwrap();
    assert!(!out.is_partial(), "{:?}", out.warnings);
    assert_eq!((out.width, out.height), (910, 1560));

    let img = image::load_from_memory(&out.bytes).unwrap().into_rgba8();
    assert_eq!(img.dimensions(), (910, 1560));
    for r in 1..=8 {
        for c in 1..=8 {
            assert_eq!(center(&img, c, r, 91, 104), tile_color(r * 10 + c), "cell {c},{r}");
        }
    }
    assert_eq!(center(&img, 0, 0, 91, 104), tile_color(0));
    assert_eq!(center(&img, 0, 14, 91, 104), tile_color(140));
    // right strip sits one gap further right in the raster
    assert_eq!(center(&img, 9, 5, 91, 104), tile_color(59));
    // unreached interior rows stay transparent black
    assert_eq!(center(&img, 5, 11, 91, 104), Rgba([0, 0, 0, 0]));
}

#[test]
fn random_key_round_trips_through_png() {
    let scheme = SchemeParameters::default();
    let page = RgbaImage::from_fn(917, 1573, |x, y| {
        Rgba([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8, 255])
    });
    let key = PermutationKey::random(64, &mut seeded_rng(Some("chapter 12")));
    let scrambled = scramble_to_bytes(&page, &key, &scheme, OutputFormat::Png).unwrap();

    let out = tilemend::descramble(scrambled).unwrap();
    assert!(!out.is_partial());
    let img = image::load_from_memory(&out.bytes).unwrap().into_rgba8();
    assert_eq!(img.dimensions(), page.dimensions());

    let (bw, bh) = (91, 104);
    for (x, y, p) in img.enumerate_pixels() {
        let interior_unreached = (bw..9 * bw).contains(&x) && (9 * bh..14 * bh).contains(&y);
        if interior_unreached {
            assert_eq!(p.0, [0, 0, 0, 0], "pixel {x},{y}");
        } else {
            assert_eq!(p, page.get_pixel(x, y), "pixel {x},{y}");
        }
    }
}

#[test]
fn jpeg_round_trip_is_close() {
    let scheme = SchemeParameters::default();
    let (bw, bh) = (80, 80);
    let page = RgbaImage::from_fn(800, 1200, |x, y| tile_color((y / bh) * 10 + x / bw));
    let key = PermutationKey::random(64, &mut seeded_rng(Some("jpeg")));
    let scrambled = scramble_to_bytes(
        &page,
        &key,
        &scheme,
        OutputFormat::Jpeg { quality: 95 },
    )
    .unwrap();

    let engine = DescramblingEngine::new(EngineConfig::builder().jpeg_quality(95).build());
    let out = engine.descramble(scrambled).unwrap();
    assert_eq!(out.format, OutputFormat::Jpeg { quality: 95 });
    let img = image::load_from_memory(&out.bytes).unwrap().into_rgba8();
    assert_eq!(img.dimensions(), (800, 1200));

    for r in (0..9).chain([14]) {
        for c in 0..10 {
            let got = center(&img, c, r, bw, bh);
            let want = tile_color(r * 10 + c);
            assert!(near(got, want, 12), "cell {c},{r}: {got:?} != {want:?}");
        }
    }
}

#[test]
fn missing_dimensions_fall_back() {
    let fields = ExifFields {
        dimensions: None,
        unique_id: Some(identity_id()),
    };
    let small = RgbaImage::from_pixel(300, 400, Rgba([9, 9, 9, 255]));
    let out = tilemend::descramble(with_exif(png(small), &fields)).unwrap();

    assert_eq!((out.width, out.height), (800, 1200));
    assert!(out
        .warnings
        .iter()
        .any(|w| matches!(w, PartialReconstruction::Clipped { .. })));
}

#[test]
fn short_key_is_flagged_not_fatal() {
    let fields = ExifFields {
        dimensions: Some((910, 1560)),
        unique_id: Some("0:1:2".to_owned()),
    };
    let out = tilemend::descramble(with_exif(png(numbered_page()), &fields)).unwrap();
    assert_eq!(
        out.warnings,
        vec![PartialReconstruction::ShortKey {
            expected: 64,
            found: 3
        }]
    );
}

#[test]
fn key_errors_are_typed() {
    let page = png(RgbaImage::new(200, 300));

    let no_id = ExifFields {
        dimensions: Some((110, 160)),
        unique_id: None,
    };
    let err = tilemend::descramble(with_exif(page.clone(), &no_id)).unwrap_err();
    assert!(matches!(err, DescrambleError::DecryptionKeyNotFound));

    let bad = ExifFields {
        dimensions: None,
        unique_id: Some("12:zz:3".to_owned()),
    };
    match tilemend::descramble(with_exif(page, &bad)).unwrap_err() {
        DescrambleError::MalformedKey { segment } => assert_eq!(segment, "zz"),
        other => panic!("unexpected {other}"),
    }
}

fn response(body: Vec<u8>) -> ImageResponse {
    ImageResponse {
        status: 200,
        headers: vec![
            ("Content-Type".to_owned(), "image/png".to_owned()),
            ("Content-Length".to_owned(), body.len().to_string()),
            ("Cache-Control".to_owned(), "max-age=60".to_owned()),
        ],
        body: Bytes::from(body),
    }
}

#[test]
fn hook_serves_original_when_key_is_missing() {
    let original = png(RgbaImage::new(200, 300));
    let hook = DescrambleHook::default();

    let out = hook
        .intercept("https://img.example/p/3.png?Signature=s1", response(original.clone()))
        .unwrap();
    assert_eq!(out.body, Bytes::from(original.clone()));
    assert_eq!(out.header("content-length"), Some(original.len().to_string().as_str()));

    let malformed = with_exif(
        original,
        &ExifFields {
            dimensions: None,
            unique_id: Some("zz:1".to_owned()),
        },
    );
    let out = hook
        .intercept("https://img.example/p/3.png?Signature=s1", response(malformed.clone()))
        .unwrap();
    assert_eq!(out.body, Bytes::from(malformed));
}

#[test]
fn hook_replaces_marked_bodies() {
    let fields = ExifFields {
        dimensions: None,
        unique_id: Some(identity_id()),
    };
    let scrambled = with_exif(png(numbered_page()), &fields);
    let hook = DescrambleHook::new(DescramblingEngine::default());
    let url = "https://img.example/p/4.png?Expires=9&Signature=s2";

    let out = hook.intercept(url, response(scrambled.clone())).unwrap();
    assert_ne!(out.body, Bytes::from(scrambled.clone()));
    assert_eq!(out.status, 200);
    assert_eq!(out.header("Cache-Control"), Some("max-age=60"));
    assert_eq!(out.header("Content-Type"), Some("image/png"));
    assert_eq!(out.header("Content-Length"), Some(out.body.len().to_string().as_str()));
    assert_eq!(image::load_from_memory(&out.body).unwrap().width(), 910);

    let untouched = hook
        .intercept("https://img.example/p/4.png", response(scrambled.clone()))
        .unwrap();
    assert_eq!(untouched.body, Bytes::from(scrambled));
}

#[test]
fn batch_runs_independent_pages() {
    let scheme = SchemeParameters::default();
    let page = RgbaImage::from_fn(800, 1200, |x, y| tile_color((y / 80) * 10 + x / 80));
    let inputs: Vec<RawImage> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|seed| {
            let key = PermutationKey::random(64, &mut seeded_rng(Some(seed)));
            RawImage::from(scramble_to_bytes(&page, &key, &scheme, OutputFormat::Png).unwrap())
        })
        .collect();

    let results = DescramblingEngine::default().descramble_batch(inputs);
    assert_eq!(results.len(), 4);
    let decoded: Vec<_> = results
        .into_iter()
        .map(|r| image::load_from_memory(&r.unwrap().bytes).unwrap().into_rgba8())
        .collect();
    // different keys, same page
    assert!(decoded.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(center(&decoded[0], 3, 4, 80, 80), tile_color(43));
}

#[test]
fn huge_claimed_dimensions_are_refused() {
    let page = png(RgbaImage::new(64, 64));
    for dims in [(u32::MAX, u32::MAX), (100_000, 100_000)] {
        let fields = ExifFields {
            dimensions: Some(dims),
            unique_id: Some(identity_id()),
        };
        let bytes = with_exif(page.clone(), &fields);

        let err = tilemend::descramble(bytes.clone()).unwrap_err();
        assert!(
            matches!(err, DescrambleError::CanvasTooLarge { width, height } if (width, height) == dims),
            "{err}"
        );
        assert!(err.is_key_error());

        let out = DescrambleHook::default()
            .intercept("https://img.example/p/5.png?Signature=s3", response(bytes.clone()))
            .unwrap();
        assert_eq!(out.body, Bytes::from(bytes));
    }
}
