//! Column visibility policy for the listing tables.
//!
//! Each listing declares its columns once, in display order. Some are
//! always visible; the rest form the user-toggleable selection that
//! persists across sessions. On narrow viewports a hard cap limits how
//! many columns may render at once.

use serde::Serialize;

/// Width below which the mobile column cap applies. Width 0 means the
/// viewport has not been measured yet and is treated as desktop.
pub const MOBILE_BREAKPOINT_PX: u32 = 640;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub always_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub columns: &'static [ColumnSpec],
    pub max_mobile_columns: usize,
}

pub const COIN_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        ColumnSpec { id: "favorite", label: "", always_visible: true },
        ColumnSpec { id: "index", label: "#", always_visible: false },
        ColumnSpec { id: "name", label: "Name", always_visible: true },
        ColumnSpec { id: "price", label: "Price", always_visible: true },
        ColumnSpec { id: "hour1Change", label: "1h%", always_visible: false },
        ColumnSpec { id: "hour24Change", label: "24h%", always_visible: false },
        ColumnSpec { id: "marketCap", label: "Market Cap", always_visible: false },
        ColumnSpec { id: "volume24", label: "Volume(24h)", always_visible: false },
        ColumnSpec { id: "supply", label: "Circulating Supply", always_visible: false },
        ColumnSpec { id: "last7Days", label: "Last 7 Days", always_visible: false },
    ],
    max_mobile_columns: 4,
};

pub const EXCHANGE_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        ColumnSpec { id: "favorite", label: "", always_visible: true },
        ColumnSpec { id: "index", label: "#", always_visible: false },
        ColumnSpec { id: "name", label: "Name", always_visible: true },
        ColumnSpec { id: "country", label: "Country", always_visible: false },
        ColumnSpec { id: "grade", label: "Grade", always_visible: false },
        ColumnSpec { id: "gradePoints", label: "Points", always_visible: false },
        ColumnSpec { id: "affiliateUrl", label: "Affiliate Link", always_visible: false },
    ],
    max_mobile_columns: 3,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewport {
    Desktop,
    Mobile,
}

impl Viewport {
    pub fn from_width(width_px: u32) -> Self {
        if width_px > 0 && width_px < MOBILE_BREAKPOINT_PX {
            Viewport::Mobile
        } else {
            Viewport::Desktop
        }
    }
}

impl ColumnLayout {
    pub fn always_visible_count(&self) -> usize {
        self.columns.iter().filter(|col| col.always_visible).count()
    }

    /// All optional column ids in declaration order. This is also the
    /// selection a fresh session starts with.
    pub fn default_selection(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|col| !col.always_visible)
            .map(|col| col.id.to_string())
            .collect()
    }

    /// Drops persisted ids that no longer name an optional column, so a
    /// stale stored selection survives column-config changes.
    pub fn sanitize_selection(&self, persisted: &[String]) -> Vec<String> {
        persisted
            .iter()
            .filter(|id| self.is_optional(id))
            .cloned()
            .collect()
    }

    /// Re-derives the selection after a viewport transition.
    ///
    /// Desktop force-resets to all optional columns. Mobile truncates to
    /// the first `cap - always_visible` selected columns, in column
    /// declaration order, and empties the selection outright when the
    /// always-visible columns alone meet the cap.
    pub fn apply_viewport(&self, viewport: Viewport, selection: &[String]) -> Vec<String> {
        match viewport {
            Viewport::Desktop => self.default_selection(),
            Viewport::Mobile => {
                let always = self.always_visible_count();
                if always >= self.max_mobile_columns {
                    return Vec::new();
                }
                let budget = self.max_mobile_columns - always;
                let selected_in_config_order: Vec<String> = self
                    .columns
                    .iter()
                    .filter(|col| !col.always_visible && selection.contains(&col.id.to_string()))
                    .map(|col| col.id.to_string())
                    .collect();
                if selected_in_config_order.len() > budget {
                    selected_in_config_order.into_iter().take(budget).collect()
                } else {
                    selection.to_vec()
                }
            }
        }
    }

    /// Toggles one optional column. Selecting a new column on mobile is
    /// rejected once the cap is reached; deselection always goes through.
    pub fn toggle(&self, viewport: Viewport, selection: &[String], column_id: &str) -> Vec<String> {
        if !self.is_optional(column_id) {
            return selection.to_vec();
        }
        let currently_selected = selection.iter().any(|id| id == column_id);
        if currently_selected {
            return selection
                .iter()
                .filter(|id| id.as_str() != column_id)
                .cloned()
                .collect();
        }
        if viewport == Viewport::Mobile
            && self.always_visible_count() + selection.len() >= self.max_mobile_columns
        {
            return selection.to_vec();
        }
        let mut next = selection.to_vec();
        next.push(column_id.to_string());
        next
    }

    /// Columns to render: always-visible plus selected, in declaration
    /// order.
    pub fn visible_columns(&self, selection: &[String]) -> Vec<&'static ColumnSpec> {
        self.columns
            .iter()
            .filter(|col| col.always_visible || selection.contains(&col.id.to_string()))
            .collect()
    }

    fn is_optional(&self, column_id: &str) -> bool {
        self.columns
            .iter()
            .any(|col| col.id == column_id && !col.always_visible)
    }
}
