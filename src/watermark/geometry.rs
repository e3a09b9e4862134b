use super::types::Anchor;

/// Horizontal or vertical third of the canvas an anchor falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Start,
    Center,
    End,
}

impl Anchor {
    pub fn horizontal_zone(&self) -> Zone {
        match self {
            Anchor::TopLeft | Anchor::CenterLeft | Anchor::BottomLeft => Zone::Start,
            Anchor::TopCenter | Anchor::Center | Anchor::BottomCenter => Zone::Center,
            Anchor::TopRight | Anchor::CenterRight | Anchor::BottomRight => Zone::End,
        }
    }

    pub fn vertical_zone(&self) -> Zone {
        match self {
            Anchor::TopLeft | Anchor::TopCenter | Anchor::TopRight => Zone::Start,
            Anchor::CenterLeft | Anchor::Center | Anchor::CenterRight => Zone::Center,
            Anchor::BottomLeft | Anchor::BottomCenter | Anchor::BottomRight => Zone::End,
        }
    }
}

fn place(zone: Zone, canvas: f32, element: f32, offset: f32) -> f32 {
    match zone {
        Zone::Start => offset,
        Zone::Center => (canvas - element) / 2.0 + offset,
        Zone::End => canvas - element - offset,
    }
}

/// Resolve the top-left pixel coordinate of an element placed at `anchor`.
///
/// The result is not clamped: large offsets may push the element partly or
/// entirely off the canvas.
pub fn resolve_position(
    canvas_width: f32,
    canvas_height: f32,
    element_width: f32,
    element_height: f32,
    anchor: Anchor,
    offset_x: f32,
    offset_y: f32,
) -> (f32, f32) {
    let x = place(anchor.horizontal_zone(), canvas_width, element_width, offset_x);
    let y = place(anchor.vertical_zone(), canvas_height, element_height, offset_y);
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_right_with_offsets() {
        let pos = resolve_position(800.0, 600.0, 100.0, 40.0, Anchor::BottomRight, 20.0, 20.0);
        assert_eq!(pos, (680.0, 540.0));
    }

    #[test]
    fn test_center_without_offsets() {
        let pos = resolve_position(800.0, 600.0, 100.0, 40.0, Anchor::Center, 0.0, 0.0);
        assert_eq!(pos, (350.0, 280.0));
    }

    #[test]
    fn test_top_left_ignores_element_size() {
        for (w, h) in [(1.0, 1.0), (100.0, 40.0), (5000.0, 3000.0)] {
            let pos = resolve_position(800.0, 600.0, w, h, Anchor::TopLeft, 15.0, 15.0);
            assert_eq!(pos, (15.0, 15.0));
        }
    }

    #[test]
    fn test_all_anchors() {
        let expected = [
            (Anchor::TopLeft, (10.0, 5.0)),
            (Anchor::TopCenter, (360.0, 5.0)),
            (Anchor::TopRight, (690.0, 5.0)),
            (Anchor::CenterLeft, (10.0, 285.0)),
            (Anchor::Center, (360.0, 285.0)),
            (Anchor::CenterRight, (690.0, 285.0)),
            (Anchor::BottomLeft, (10.0, 555.0)),
            (Anchor::BottomCenter, (360.0, 555.0)),
            (Anchor::BottomRight, (690.0, 555.0)),
        ];
        for (anchor, pos) in expected {
            assert_eq!(
                resolve_position(800.0, 600.0, 100.0, 40.0, anchor, 10.0, 5.0),
                pos,
                "anchor {:?}",
                anchor
            );
        }
    }

    #[test]
    fn test_offsets_are_not_clamped() {
        let (x, y) = resolve_position(200.0, 100.0, 50.0, 20.0, Anchor::BottomRight, 500.0, 500.0);
        assert_eq!((x, y), (-350.0, -420.0));

        let (x, y) = resolve_position(200.0, 100.0, 50.0, 20.0, Anchor::TopLeft, 900.0, 0.0);
        assert_eq!((x, y), (900.0, 0.0));
    }

    #[test]
    fn test_element_larger_than_canvas_centers_negative() {
        let pos = resolve_position(100.0, 100.0, 300.0, 300.0, Anchor::Center, 0.0, 0.0);
        assert_eq!(pos, (-100.0, -100.0));
    }
}
