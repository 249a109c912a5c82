// ── Data-table state ──
//
// Cross-cutting state every entity table needs, independent of column
// definitions: column order and visibility, id-keyed row selection that
// survives paging and sorting, scrollability, pagination, filter and sort.

use std::fmt;

use indexmap::IndexMap;
use ledgerdesk_api::{FilterDescriptor, FilterField, PageQuery, Paginated, SortDescriptor};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::{EntityId, Record};

/// Row id → selected. Only `true` entries are ever stored.
pub type RowSelection = IndexMap<EntityId, bool>;

type SelectionCallback<T> = Box<dyn Fn(&[T]) + Send + Sync>;

/// Either a replacement value or a function of the previous value.
pub enum Updater<S> {
    Value(S),
    Fn(Box<dyn FnOnce(&S) -> S + Send>),
}

impl<S> Updater<S> {
    pub fn func(f: impl FnOnce(&S) -> S + Send + 'static) -> Self {
        Self::Fn(Box::new(f))
    }

    pub fn apply(self, previous: &S) -> S {
        match self {
            Self::Value(value) => value,
            Self::Fn(f) => f(previous),
        }
    }
}

impl<S> From<S> for Updater<S> {
    fn from(value: S) -> Self {
        Self::Value(value)
    }
}

// ── Preferences ─────────────────────────────────────────────────────

/// The persistable subset of table state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablePreferences {
    pub column_order: Vec<String>,
    pub scrollable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    /// Last, so it renders as a trailing TOML table.
    pub column_visibility: IndexMap<String, bool>,
}

// ── Pagination ──────────────────────────────────────────────────────

/// 0-based page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub page_index: u32,
    pub page_size: u32,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: ledgerdesk_api::query::DEFAULT_PAGE_SIZE,
        }
    }
}

// ── Table state ─────────────────────────────────────────────────────

pub struct TableState<T> {
    column_order: Vec<String>,
    column_visibility: IndexMap<String, bool>,
    row_selection: RowSelection,
    /// Records for every selected id, including ones on other pages.
    selected_rows: IndexMap<EntityId, T>,
    scrollable: bool,
    pagination: PaginationState,
    filter: FilterDescriptor,
    sort: SortDescriptor,
    on_selection_change: Option<SelectionCallback<T>>,
}

impl<T> fmt::Debug for TableState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableState")
            .field("column_order", &self.column_order)
            .field("column_visibility", &self.column_visibility)
            .field("row_selection", &self.row_selection)
            .field("scrollable", &self.scrollable)
            .field("pagination", &self.pagination)
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .finish_non_exhaustive()
    }
}

impl<T: Record + Clone> TableState<T> {
    /// All columns start visible, in the given order.
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        let column_order: Vec<String> = columns.iter().map(|c| c.as_ref().to_owned()).collect();
        let column_visibility = column_order.iter().map(|c| (c.clone(), true)).collect();
        Self {
            column_order,
            column_visibility,
            row_selection: RowSelection::new(),
            selected_rows: IndexMap::new(),
            scrollable: false,
            pagination: PaginationState::default(),
            filter: FilterDescriptor::new(),
            sort: SortDescriptor::new(),
            on_selection_change: None,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.pagination.page_size = page_size;
        self
    }

    /// Called with every selected record whenever the selection changes.
    #[must_use]
    pub fn on_selection_change(mut self, f: impl Fn(&[T]) + Send + Sync + 'static) -> Self {
        self.on_selection_change = Some(Box::new(f));
        self
    }

    // ── Columns ──────────────────────────────────────────────────────

    pub fn column_order(&self) -> &[String] {
        &self.column_order
    }

    /// Reorder columns. Unknown ids are dropped and columns missing from
    /// `order` keep their relative position at the end.
    pub fn set_column_order<S: AsRef<str>>(&mut self, order: &[S]) {
        let mut next: Vec<String> = Vec::with_capacity(self.column_order.len());
        for id in order {
            let id = id.as_ref();
            if self.column_visibility.contains_key(id) && !next.iter().any(|c| c == id) {
                next.push(id.to_owned());
            }
        }
        for id in &self.column_order {
            if !next.contains(id) {
                next.push(id.clone());
            }
        }
        self.column_order = next;
    }

    /// Move one column to `to` (clamped). Returns `false` for unknown ids.
    pub fn move_column(&mut self, id: &str, to: usize) -> bool {
        let Some(from) = self.column_order.iter().position(|c| c == id) else {
            return false;
        };
        let column = self.column_order.remove(from);
        let to = to.min(self.column_order.len());
        self.column_order.insert(to, column);
        true
    }

    pub fn set_column_visible(&mut self, id: &str, visible: bool) -> bool {
        match self.column_visibility.get_mut(id) {
            Some(slot) => {
                *slot = visible;
                true
            }
            None => false,
        }
    }

    pub fn toggle_column(&mut self, id: &str) -> bool {
        let visible = self.is_column_visible(id);
        self.set_column_visible(id, !visible)
    }

    pub fn is_column_visible(&self, id: &str) -> bool {
        self.column_visibility.get(id).copied().unwrap_or(false)
    }

    pub fn column_visibility(&self) -> &IndexMap<String, bool> {
        &self.column_visibility
    }

    /// Visible columns in display order.
    pub fn visible_columns(&self) -> Vec<&str> {
        self.column_order
            .iter()
            .filter(|c| self.is_column_visible(c))
            .map(String::as_str)
            .collect()
    }

    // ── Scrolling ────────────────────────────────────────────────────

    pub fn is_scrollable(&self) -> bool {
        self.scrollable
    }

    pub fn set_scrollable(&mut self, scrollable: bool) {
        self.scrollable = scrollable;
    }

    pub fn toggle_scrollable(&mut self) {
        self.scrollable = !self.scrollable;
    }

    // ── Selection ────────────────────────────────────────────────────

    pub fn row_selection(&self) -> &RowSelection {
        &self.row_selection
    }

    pub fn is_selected(&self, id: &EntityId) -> bool {
        self.row_selection.get(id).copied().unwrap_or(false)
    }

    /// The slice of the selection that falls on `current_page`.
    pub fn page_selection(&self, current_page: &[T]) -> RowSelection {
        current_page
            .iter()
            .map(Record::record_id)
            .filter(|id| self.is_selected(id))
            .map(|id| (id.clone(), true))
            .collect()
    }

    pub fn selected_ids(&self) -> Vec<EntityId> {
        self.row_selection.keys().cloned().collect()
    }

    pub fn selected_rows(&self) -> Vec<T> {
        self.selected_rows.values().cloned().collect()
    }

    /// Apply a selection change coming from a table showing `current_page`.
    ///
    /// The updater sees only the current page's slice. Ids on other pages
    /// are untouched, which is what keeps a selection alive across paging.
    pub fn handle_row_selection_change(
        &mut self,
        current_page: &[T],
        update: impl Into<Updater<RowSelection>>,
    ) {
        let previous = self.page_selection(current_page);
        let next = update.into().apply(&previous);

        for row in current_page {
            let id = row.record_id();
            if next.get(id).copied().unwrap_or(false) {
                self.row_selection.insert(id.clone(), true);
                self.selected_rows.insert(id.clone(), row.clone());
            } else {
                self.row_selection.shift_remove(id);
                self.selected_rows.shift_remove(id);
            }
        }

        trace!(selected = self.row_selection.len(), "row selection changed");
        self.notify_selection();
    }

    pub fn clear_selection(&mut self) {
        self.row_selection.clear();
        self.selected_rows.clear();
        self.notify_selection();
    }

    fn notify_selection(&self) {
        if let Some(callback) = &self.on_selection_change {
            let rows: Vec<T> = self.selected_rows.values().cloned().collect();
            callback(&rows);
        }
    }

    // ── Pagination ───────────────────────────────────────────────────

    pub fn pagination(&self) -> PaginationState {
        self.pagination
    }

    pub fn set_page_index(&mut self, page_index: u32) {
        self.pagination.page_index = page_index;
    }

    pub fn next_page(&mut self) {
        self.pagination.page_index = self.pagination.page_index.saturating_add(1);
    }

    pub fn previous_page(&mut self) {
        self.pagination.page_index = self.pagination.page_index.saturating_sub(1);
    }

    /// Changing the page size restarts at the first page.
    pub fn set_page_size(&mut self, page_size: u32) {
        self.pagination = PaginationState {
            page_index: 0,
            page_size,
        };
    }

    /// Clamp the page index after a result reports fewer pages.
    /// Returns `true` if the index moved.
    pub fn sync_with<U>(&mut self, page: &Paginated<U>) -> bool {
        let last = u32::try_from(page.total_page.saturating_sub(1)).unwrap_or(u32::MAX);
        if self.pagination.page_index > last {
            self.pagination.page_index = last;
            true
        } else {
            false
        }
    }

    // ── Filter & sort ────────────────────────────────────────────────

    pub fn filter(&self) -> &FilterDescriptor {
        &self.filter
    }

    /// Any filter change resets the page index to 0.
    pub fn set_filter(&mut self, filter: FilterDescriptor) {
        self.filter = filter;
        self.pagination.page_index = 0;
    }

    /// Set or clear (`None`) a single field predicate.
    pub fn set_filter_field(&mut self, field: &str, predicate: Option<FilterField>) {
        match predicate {
            Some(predicate) => {
                self.filter.insert(field, predicate);
            }
            None => {
                self.filter.remove(field);
            }
        }
        self.pagination.page_index = 0;
    }

    pub fn sort(&self) -> &SortDescriptor {
        &self.sort
    }

    /// Sorting keeps the current page.
    pub fn set_sort(&mut self, sort: SortDescriptor) {
        self.sort = sort;
    }

    /// The `/search` request this state describes.
    pub fn page_query(&self) -> PageQuery {
        let mut query = PageQuery::page(self.pagination.page_index, self.pagination.page_size);
        if !self.filter.is_empty() {
            query = query.with_filter(self.filter.clone());
        }
        if !self.sort.is_empty() {
            query = query.with_sort(self.sort.clone());
        }
        query
    }

    // ── Preferences ──────────────────────────────────────────────────

    pub fn preferences(&self) -> TablePreferences {
        TablePreferences {
            column_order: self.column_order.clone(),
            scrollable: self.scrollable,
            page_size: Some(self.pagination.page_size),
            column_visibility: self.column_visibility.clone(),
        }
    }

    /// Re-apply saved preferences. Columns the table no longer has are
    /// ignored; columns added since are appended and stay visible.
    pub fn apply_preferences(&mut self, prefs: &TablePreferences) {
        self.set_column_order(prefs.column_order.as_slice());
        for (id, visible) in &prefs.column_visibility {
            self.set_column_visible(id, *visible);
        }
        self.scrollable = prefs.scrollable;
        if let Some(page_size) = prefs.page_size.filter(|s| *s > 0) {
            self.set_page_size(page_size);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ledgerdesk_api::{FilterDataType, FilterMode};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: EntityId,
    }

    impl Record for Row {
        fn record_id(&self) -> &EntityId {
            &self.id
        }
    }

    fn rows(ids: &[&str]) -> Vec<Row> {
        ids.iter().map(|id| Row { id: EntityId::from(*id) }).collect()
    }

    fn select(ids: &[&str]) -> RowSelection {
        ids.iter().map(|id| (EntityId::from(*id), true)).collect()
    }

    #[test]
    fn selection_survives_page_changes() {
        let page_one = rows(&["abc", "def"]);
        let page_two = rows(&["ghi", "jkl"]);
        let mut table: TableState<Row> = TableState::new(&["name", "entry_date"]);

        table.handle_row_selection_change(&page_one, select(&["abc"]));
        table.set_page_index(1);
        table.handle_row_selection_change(
            &page_two,
            Updater::func(|prev: &RowSelection| {
                let mut next = prev.clone();
                next.insert(EntityId::from("jkl"), true);
                next
            }),
        );
        table.set_page_index(0);

        let on_page_one = table.page_selection(&page_one);
        assert!(on_page_one.contains_key(&EntityId::from("abc")));
        assert!(table.is_selected(&EntityId::from("jkl")));
        assert_eq!(table.selected_rows().len(), 2);
    }

    #[test]
    fn deselecting_on_one_page_keeps_other_pages() {
        let page_one = rows(&["abc", "def"]);
        let page_two = rows(&["ghi"]);
        let mut table: TableState<Row> = TableState::new(&["name"]);

        table.handle_row_selection_change(&page_one, select(&["abc", "def"]));
        table.handle_row_selection_change(&page_two, select(&["ghi"]));
        table.handle_row_selection_change(&page_one, select(&["def"]));

        assert_eq!(
            table.selected_ids(),
            vec![EntityId::from("def"), EntityId::from("ghi")]
        );
    }

    #[test]
    fn selection_callback_receives_all_selected_rows() {
        let seen = Arc::new(Mutex::new(0usize));
        let seen_cb = Arc::clone(&seen);
        let mut table: TableState<Row> = TableState::new(&["name"])
            .on_selection_change(move |rows| *seen_cb.lock().unwrap() = rows.len());

        table.handle_row_selection_change(&rows(&["a"]), select(&["a"]));
        table.handle_row_selection_change(&rows(&["b"]), select(&["b"]));
        assert_eq!(*seen.lock().unwrap(), 2);

        table.clear_selection();
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn filter_change_resets_page_index() {
        let mut table: TableState<Row> = TableState::new(&["name"]);
        table.set_page_index(4);

        table.set_filter_field(
            "name",
            Some(FilterField::new(FilterMode::Contains, FilterDataType::Text, "Year")),
        );
        assert_eq!(table.pagination().page_index, 0);

        table.set_page_index(2);
        table.set_filter(FilterDescriptor::new());
        assert_eq!(table.pagination().page_index, 0);
    }

    #[test]
    fn sort_change_keeps_page_but_page_size_resets_it() {
        let mut table: TableState<Row> = TableState::new(&["name"]);
        table.set_page_index(3);
        table.set_sort(SortDescriptor::new().asc("name"));
        assert_eq!(table.pagination().page_index, 3);

        table.set_page_size(50);
        assert_eq!(
            table.pagination(),
            PaginationState {
                page_index: 0,
                page_size: 50
            }
        );
    }

    #[test]
    fn sync_clamps_out_of_range_page() {
        let mut table: TableState<Row> = TableState::new(&["name"]);
        table.set_page_index(7);

        let mut page: Paginated<Row> = Paginated::empty(7, 10);
        page.total_size = 25;
        page.total_page = 3;
        assert!(table.sync_with(&page));
        assert_eq!(table.pagination().page_index, 2);

        assert!(table.sync_with(&Paginated::<Row>::empty(2, 10)));
        assert_eq!(table.pagination().page_index, 0);
    }

    #[test]
    fn page_query_omits_empty_descriptors() {
        let table: TableState<Row> = TableState::new(&["name"]);
        let query = table.page_query();
        assert!(query.filter.is_none());
        assert!(query.sort.is_none());
    }

    #[test]
    fn column_order_and_visibility() {
        let mut table: TableState<Row> = TableState::new(&["name", "entry_date", "description"]);
        table.set_column_order(&["description", "bogus", "name"]);
        assert_eq!(table.column_order(), ["description", "name", "entry_date"]);

        assert!(table.move_column("entry_date", 0));
        assert!(!table.move_column("bogus", 0));
        table.toggle_column("name");
        assert_eq!(table.visible_columns(), vec!["entry_date", "description"]);
    }

    #[test]
    fn preferences_round_trip_tolerates_schema_drift() {
        let mut old: TableState<Row> = TableState::new(&["name", "legacy", "entry_date"]);
        old.set_column_order(&["entry_date", "name", "legacy"]);
        old.set_column_visible("name", false);
        old.set_scrollable(true);
        let prefs = old.preferences();

        let mut new: TableState<Row> = TableState::new(&["name", "entry_date", "created_by"]);
        new.apply_preferences(&prefs);

        assert_eq!(new.column_order(), ["entry_date", "name", "created_by"]);
        assert!(!new.is_column_visible("name"));
        assert!(new.is_column_visible("created_by"));
        assert!(new.is_scrollable());
    }
}
