//! Cursor, scroll window and filter term over a list of stations.
//!
//! The cursor follows a station id rather than a position: replacing the
//! contents or changing the term keeps it on the same station whenever that
//! station is still shown.

use tuner_proto::station::{station_matches, Station};

/// One rendered row of the window.
pub struct Row<'a> {
    pub station: &'a Station,
    pub under_cursor: bool,
}

#[derive(Default)]
pub struct StationList {
    stations: Vec<Station>,
    /// Indices into `stations` that pass `term`, in directory order.
    shown: Vec<usize>,
    cursor: usize,
    offset: usize,
    term: String,
}

impl StationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, stations: Vec<Station>) {
        let keep = self.current().map(|s| s.id.clone());
        self.stations = stations;
        self.refilter(keep.as_deref());
    }

    pub fn set_term(&mut self, term: &str) {
        let keep = self.current().map(|s| s.id.clone());
        self.term = term.to_string();
        self.offset = 0;
        self.refilter(keep.as_deref());
    }

    fn refilter(&mut self, keep: Option<&str>) {
        self.shown = self
            .stations
            .iter()
            .enumerate()
            .filter(|(_, s)| station_matches(s, &self.term))
            .map(|(i, _)| i)
            .collect();
        let kept = keep.and_then(|id| self.shown.iter().position(|&i| self.stations[i].id == id));
        self.cursor = match kept {
            Some(pos) => pos,
            None => self.cursor.min(self.shown.len().saturating_sub(1)),
        };
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn current(&self) -> Option<&Station> {
        self.shown.get(self.cursor).map(|&i| &self.stations[i])
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor by `delta` rows, stopping at either end.
    pub fn step(&mut self, delta: isize) {
        if self.shown.is_empty() {
            return;
        }
        let last = self.shown.len() - 1;
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
    }

    pub fn to_start(&mut self) {
        self.cursor = 0;
    }

    pub fn to_end(&mut self) {
        self.cursor = self.shown.len().saturating_sub(1);
    }

    /// Put the cursor on window row `row`.  False if that row is empty.
    pub fn click(&mut self, row: usize) -> bool {
        let target = self.offset + row;
        if target >= self.shown.len() {
            return false;
        }
        self.cursor = target;
        true
    }

    /// Scroll so the cursor fits in a window of `height` rows.
    pub fn scroll(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }
    }

    /// The `height` rows from the current scroll offset.
    pub fn window(&self, height: usize) -> Vec<Row<'_>> {
        let start = self.offset.min(self.shown.len());
        let end = (start + height).min(self.shown.len());
        self.shown[start..end]
            .iter()
            .enumerate()
            .map(|(row, &i)| Row {
                station: &self.stations[i],
                under_cursor: start + row == self.cursor,
            })
            .collect()
    }

    /// Cursor position inside the window.
    pub fn cursor_row(&self) -> usize {
        self.cursor.saturating_sub(self.offset)
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }

    pub fn total(&self) -> usize {
        self.stations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_proto::station::seed_stations;

    fn seeded() -> StationList {
        let mut list = StationList::new();
        list.replace(seed_stations());
        list
    }

    fn current_id(list: &StationList) -> Option<&str> {
        list.current().map(|s| s.id.as_str())
    }

    #[test]
    fn test_term_keeps_cursor_on_station() {
        let mut list = seeded();
        list.step(2);
        assert_eq!(current_id(&list), Some("3"));
        list.set_term("hindi");
        assert_eq!(list.len(), 1);
        assert_eq!(current_id(&list), Some("3"));
        list.set_term("");
        assert_eq!(list.len(), 3);
        assert_eq!(current_id(&list), Some("3"));
    }

    #[test]
    fn test_no_match_leaves_nothing_under_cursor() {
        let mut list = seeded();
        list.set_term("zzz");
        assert!(list.is_empty());
        assert_eq!(list.total(), 3);
        assert!(list.current().is_none());
        list.step(1);
        assert_eq!(list.cursor(), 0);
    }

    #[test]
    fn test_step_stops_at_ends() {
        let mut list = seeded();
        list.step(-4);
        assert_eq!(current_id(&list), Some("1"));
        list.step(10);
        assert_eq!(current_id(&list), Some("3"));
    }

    #[test]
    fn test_window_follows_cursor() {
        let mut list = seeded();
        list.to_end();
        list.scroll(2);
        let ids: Vec<&str> = list
            .window(2)
            .iter()
            .map(|row| row.station.id.as_str())
            .collect();
        assert_eq!(ids, ["2", "3"]);
        assert_eq!(list.cursor_row(), 1);

        assert!(list.click(0));
        assert_eq!(current_id(&list), Some("2"));
        assert!(!list.click(4));
    }

    #[test]
    fn test_replace_drops_vanished_station() {
        let mut list = seeded();
        list.to_end();
        list.replace(seed_stations().into_iter().take(2).collect());
        assert_eq!(current_id(&list), Some("2"));
    }
}
