// Geometry properties of the grid plan, checked over many canvas sizes.

use proptest::prelude::*;
use tilemend::exif::ExifFields;
use tilemend::{BlockCopy, GridPlan, PermutationKey, SchemeParameters};

fn plan_for(cw: u32, ch: u32, s: &SchemeParameters) -> GridPlan {
    GridPlan::new((cw + s.width_cut, ch + s.height_cut), (cw, ch), s)
}

// Destination rectangles of every copy a full identity key produces.
fn all_copies(plan: &GridPlan, s: &SchemeParameters) -> Vec<BlockCopy> {
    let mut v: Vec<_> = plan.border_copies(s).into_iter().collect();
    for (m, &i) in PermutationKey::identity(64).as_slice().iter().enumerate() {
        v.push(plan.interior_copy(s, m, i).unwrap());
    }
    v.retain(|c| !c.is_empty());
    v
}

fn overlaps(a: &BlockCopy, b: &BlockCopy) -> bool {
    let (ax, ay) = a.dst;
    let (bx, by) = b.dst;
    ax < bx + b.width && bx < ax + a.width && ay < by + b.height && by < ay + a.height
}

fn covered_width(copies: &[BlockCopy], y: u32) -> u32 {
    copies
        .iter()
        .filter(|c| (c.dst.1..c.dst.1 + c.height).contains(&y))
        .map(|c| c.width)
        .sum()
}

fn covered_height(copies: &[BlockCopy], x: u32) -> u32 {
    copies
        .iter()
        .filter(|c| (c.dst.0..c.dst.0 + c.width).contains(&x))
        .map(|c| c.height)
        .sum()
}

proptest! {
    #[test]
    fn writes_never_overlap(cw in 150u32..2000, ch in 150u32..3000) {
        let s = SchemeParameters::default();
        let plan = plan_for(cw, ch, &s);
        let copies = all_copies(&plan, &s);

        for (i, a) in copies.iter().enumerate() {
            for b in &copies[i + 1..] {
                prop_assert!(!overlaps(a, b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn copies_fit_without_clipping(cw in 150u32..2000, ch in 150u32..3000) {
        let s = SchemeParameters::default();
        let plan = plan_for(cw, ch, &s);
        let raster = (plan.raster_width, plan.raster_height);

        for c in all_copies(&plan, &s) {
            prop_assert_eq!(c.clip(raster, (cw, ch)), Some(c));
        }
    }

    #[test]
    fn remainders_are_absorbed(cw in 150u32..2000, ch in 150u32..3000) {
        let s = SchemeParameters::default();
        let plan = plan_for(cw, ch, &s);
        let copies = all_copies(&plan, &s);
        let (bw, bh) = (plan.block_width, plan.block_height);

        // rows through the top strip and through the first interior row
        prop_assert_eq!(covered_width(&copies, 0), cw);
        prop_assert_eq!(covered_width(&copies, bh + bh / 2), cw);
        prop_assert_eq!(covered_width(&copies, ch - 1), cw);
        // columns through the left strip, an interior column, the right strip
        prop_assert_eq!(covered_height(&copies, 0), ch);
        prop_assert_eq!(covered_height(&copies, cw - 1), ch);
        // the key only reaches 8 of the 13 interior rows
        prop_assert_eq!(covered_height(&copies, bw + bw / 2), ch - 5 * bh);
    }

    #[test]
    fn key_parser_never_panics(id in ".{0,64}") {
        let _ = PermutationKey::parse(&id);
    }

    #[test]
    fn exif_parser_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = ExifFields::parse(&raw);
    }

    #[test]
    fn exif_parser_survives_corrupted_blocks(
        flips in proptest::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8)
    ) {
        let mut raw = ExifFields {
            dimensions: Some((910, 1560)),
            unique_id: Some("0:1:2:3:4:5".to_owned()),
        }
        .to_tiff();
        for (at, v) in flips {
            let i = at.index(raw.len());
            raw[i] = v;
        }
        let _ = ExifFields::parse(&raw);
    }
}
