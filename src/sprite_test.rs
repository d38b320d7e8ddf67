#![allow(clippy::float_cmp)]

use super::*;

fn sheet(columns: usize, rows: usize) -> SpriteSheet {
    SpriteSheet::new("hero", columns, rows).unwrap()
}

#[test]
fn zero_columns_rejected() {
    let err = SpriteSheet::new("bad", 0, 1).unwrap_err();
    assert!(err.to_string().contains("columns"));
}

#[test]
fn zero_rows_rejected() {
    let err = SpriteSheet::new("bad", 3, 0).unwrap_err();
    assert!(err.to_string().contains("rows"));
}

#[test]
fn total_frames_is_grid_area() {
    assert_eq!(sheet(4, 3).total_frames(), 12);
    assert_eq!(sheet(1, 1).total_frames(), 1);
}

#[test]
fn accessors() {
    let s = sheet(4, 2);
    assert_eq!(s.name(), "hero");
    assert_eq!(s.columns(), 4);
    assert_eq!(s.rows(), 2);
}

#[test]
fn frame_size_divides_width_by_columns_and_height_by_rows() {
    let s = sheet(4, 2);
    assert_eq!(s.frame_size(Size::new(128.0, 64.0)), Size::new(32.0, 32.0));
}

#[test]
fn cell_is_row_major() {
    let s = sheet(4, 3);
    assert_eq!(s.cell(0), (0, 0));
    assert_eq!(s.cell(3), (3, 0));
    assert_eq!(s.cell(4), (0, 1));
    assert_eq!(s.cell(11), (3, 2));
}

#[test]
fn source_rect_for_non_square_grid() {
    // 3 columns x 2 rows, 96x40 image: frames are 32x20.
    let s = sheet(3, 2);
    let r = s.frame_source_rect(Size::new(96.0, 40.0), 4).unwrap();
    assert_eq!(r, Rect::new(32.0, 20.0, 32.0, 20.0));
}

#[test]
fn source_rect_first_frame_is_origin() {
    let s = sheet(4, 1);
    let r = s.frame_source_rect(Size::new(64.0, 16.0), 0).unwrap();
    assert_eq!(r, Rect::new(0.0, 0.0, 16.0, 16.0));
}

#[test]
fn source_rect_out_of_range() {
    let s = sheet(2, 2);
    let err = s.frame_source_rect(Size::new(64.0, 64.0), 4).unwrap_err();
    assert_eq!(err, DrawError::FrameOutOfRange { sheet: "hero".into(), frame: 4, total: 4 });
}

#[test]
fn deserialize_validates_dimensions() {
    let ok: SpriteSheet = serde_json::from_str(r#"{"name":"tiles","columns":8,"rows":4}"#).unwrap();
    assert_eq!(ok.total_frames(), 32);
    let bad = serde_json::from_str::<SpriteSheet>(r#"{"name":"tiles","columns":0,"rows":4}"#);
    assert!(bad.is_err());
}
