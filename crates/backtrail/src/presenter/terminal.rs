//! Plain-text view for the terminal.

use std::io::Write;

use tracing::warn;

use super::view::{LocationRow, MapScene, RowDiff, TrackView};

/// Writes table updates, map summaries and alerts as lines of text.
#[derive(Debug)]
pub struct TerminalView<W> {
    out: W,
}

impl<W: Write> TerminalView<W> {
    /// Create a view writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the view, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_row(&mut self, row: &LocationRow) -> std::io::Result<()> {
        writeln!(self.out, "  {:<28} {}", row.coordinate, row.timestamps)
    }

    fn write_table(&mut self, rows: &[LocationRow]) -> std::io::Result<()> {
        writeln!(self.out, "{} recorded location(s)", rows.len())?;
        for row in rows {
            self.print_row(row)?;
        }
        Ok(())
    }

    fn write_inserted(&mut self, diff: &RowDiff, rows: &[LocationRow]) -> std::io::Result<()> {
        for &idx in &diff.inserted {
            if let Some(row) = rows.get(idx) {
                write!(self.out, "+ [{idx}]")?;
                self.print_row(row)?;
            }
        }
        Ok(())
    }

    fn write_or_warn(&mut self, result: std::io::Result<()>) {
        if let Err(e) = result.and_then(|()| self.out.flush()) {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write> TrackView for TerminalView<W> {
    fn reload_table(&mut self, rows: &[LocationRow]) {
        let result = self.write_table(rows);
        self.write_or_warn(result);
    }

    fn insert_rows(&mut self, diff: &RowDiff, rows: &[LocationRow]) {
        let result = self.write_inserted(diff, rows);
        self.write_or_warn(result);
    }

    fn render_map(&mut self, scene: &MapScene) {
        let result = match scene.pins.first() {
            Some(head) => writeln!(
                self.out,
                "map: {} pin(s), {} {}pt trail, latest {}, {} ({:?})",
                scene.pins.len(),
                scene.style.stroke_color,
                scene.style.line_width,
                head.longitude,
                head.latitude,
                scene.camera
            ),
            None => writeln!(self.out, "map: empty ({:?})", scene.camera),
        };
        self.write_or_warn(result);
    }

    fn show_alert(&mut self, message: &str) {
        let result = writeln!(self.out, "! {message}");
        self.write_or_warn(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::view::{CameraMode, TrailStyle};
    use crate::record::Coordinate;

    fn row(coordinate: &str) -> LocationRow {
        LocationRow {
            coordinate: coordinate.to_string(),
            timestamps: "1/7/24, 12:00:00 PM @ 1/7/24, 12:01:05 PM".to_string(),
        }
    }

    fn output(view: TerminalView<Vec<u8>>) -> String {
        String::from_utf8(view.into_inner()).unwrap()
    }

    #[test]
    fn test_reload_table() {
        let mut view = TerminalView::new(Vec::new());
        view.reload_table(&[row("-122.03, 37.33"), row("-122.04, 37.34")]);

        let text = output(view);
        assert!(text.starts_with("2 recorded location(s)\n"));
        assert!(text.contains("-122.03, 37.33"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_insert_rows_prints_only_new_rows() {
        let mut view = TerminalView::new(Vec::new());
        let rows = [row("a"), row("b"), row("c")];
        view.insert_rows(&RowDiff { inserted: vec![0, 2] }, &rows);

        let text = output(view);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("+ [0]"));
        assert!(lines[1].starts_with("+ [2]"));
        assert!(lines[1].contains(" c "));
    }

    #[test]
    fn test_render_map() {
        let mut view = TerminalView::new(Vec::new());
        let scene = MapScene {
            pins: vec![Coordinate::new(37.5, -122.25)],
            trail: vec![Coordinate::new(37.5, -122.25)],
            style: TrailStyle::default(),
            camera: CameraMode::Follow,
        };
        view.render_map(&scene);

        assert_eq!(
            output(view),
            "map: 1 pin(s), blue 4pt trail, latest -122.25, 37.5 (Follow)\n"
        );
    }

    #[test]
    fn test_render_empty_map() {
        let mut view = TerminalView::new(Vec::new());
        view.render_map(&MapScene::from_records(
            &[],
            TrailStyle::default(),
            CameraMode::Free,
        ));
        assert_eq!(output(view), "map: empty (Free)\n");
    }

    #[test]
    fn test_show_alert() {
        let mut view = TerminalView::new(Vec::new());
        view.show_alert("Significant change not available");
        assert_eq!(output(view), "! Significant change not available\n");
    }
}
