//! Row reconciliation for the listing tables.
//!
//! Decides, for one render pass, which entities appear on the requested
//! page, in what order, and under which pagination scheme:
//! - no search, no favorites filter: the server page is shown as-is and
//!   the upstream page count drives the pagination control (`ServerPaged`);
//! - search or favorites active: filtering runs over the full universe
//!   when one is available and pages are cut locally (`ClientPaged`).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Fixed page size shared by the upstream listing API and local slicing.
pub const PAGE_SIZE: usize = 100;

/// Minimal view of a listed entity the engine needs. Everything else on
/// the record is pass-through.
pub trait ListEntity {
    fn entity_id(&self) -> &str;
    fn symbol_name(&self) -> &str;
    fn full_name(&self) -> &str {
        self.symbol_name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationMode {
    ServerPaged,
    ClientPaged,
}

/// One render pass worth of inputs. `requested_page` is 1-based and comes
/// straight from the URL; the engine never clamps it.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a, E> {
    pub current_page: &'a [E],
    pub universe: Option<&'a [E]>,
    pub search: &'a str,
    pub favorites_only: bool,
    pub favorites: &'a HashSet<String>,
    pub requested_page: u32,
    pub server_total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedRow<E> {
    pub ordinal: u64,
    pub entity: E,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlan<E> {
    pub mode: PaginationMode,
    pub total_pages: u32,
    pub rows: Vec<ListedRow<E>>,
}

pub fn pages_for_count(count: u32, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

/// Pure reconciliation pass. Running it twice with identical inputs
/// yields identical output.
///
/// Row ordinals are computed from `requested_page` in both pagination
/// modes, so a client-paged page 2 starts numbering at 101 even when
/// fewer than 100 filtered rows precede it. The upstream behavior is
/// kept on purpose; see DESIGN.md before changing it.
pub fn reconcile_page<E>(input: &ReconcileInput<'_, E>) -> PagePlan<E>
where
    E: ListEntity + Clone,
{
    let query = input.search.trim().to_lowercase();
    let filtering = input.favorites_only || !query.is_empty();

    let source: &[E] = match input.universe {
        Some(universe) if filtering && !universe.is_empty() => universe,
        _ => input.current_page,
    };

    let mut seen: HashSet<&str> = HashSet::with_capacity(source.len());
    let mut filtered: Vec<&E> = Vec::with_capacity(source.len());
    for entity in source {
        if input.favorites_only && !input.favorites.contains(entity.entity_id()) {
            continue;
        }
        if !query.is_empty() && !matches_query(entity, &query) {
            continue;
        }
        if seen.insert(entity.entity_id()) {
            filtered.push(entity);
        }
    }

    let page_index = input.requested_page.saturating_sub(1) as usize;
    let ordinal_base = (page_index * PAGE_SIZE) as u64;

    let (mode, total_pages, page_rows) = if filtering {
        let total = pages_for_count(filtered.len() as u32, PAGE_SIZE as u32);
        let start = page_index.saturating_mul(PAGE_SIZE);
        let slice: Vec<&E> = filtered.into_iter().skip(start).take(PAGE_SIZE).collect();
        (PaginationMode::ClientPaged, total, slice)
    } else {
        let universe_empty = input.universe.map_or(true, |u| u.is_empty());
        let total = if input.current_page.is_empty() && universe_empty {
            0
        } else {
            input.server_total_pages
        };
        (PaginationMode::ServerPaged, total, filtered)
    };

    let rows = page_rows
        .into_iter()
        .enumerate()
        .map(|(index, entity)| ListedRow {
            ordinal: ordinal_base + index as u64 + 1,
            entity: entity.clone(),
        })
        .collect();

    PagePlan {
        mode,
        total_pages,
        rows,
    }
}

fn matches_query<E: ListEntity>(entity: &E, query: &str) -> bool {
    entity.symbol_name().to_lowercase().contains(query)
        || entity.full_name().to_lowercase().contains(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Asset {
        id: String,
        name: String,
        full_name: String,
    }

    impl ListEntity for Asset {
        fn entity_id(&self) -> &str {
            &self.id
        }

        fn symbol_name(&self) -> &str {
            &self.name
        }

        fn full_name(&self) -> &str {
            &self.full_name
        }
    }

    fn asset(id: &str, name: &str, full_name: &str) -> Asset {
        Asset {
            id: id.to_string(),
            name: name.to_string(),
            full_name: full_name.to_string(),
        }
    }

    fn input<'a>(
        current_page: &'a [Asset],
        universe: Option<&'a [Asset]>,
        favorites: &'a HashSet<String>,
    ) -> ReconcileInput<'a, Asset> {
        ReconcileInput {
            current_page,
            universe,
            search: "",
            favorites_only: false,
            favorites,
            requested_page: 1,
            server_total_pages: 3,
        }
    }

    #[test]
    fn unfiltered_pass_returns_server_page_verbatim() {
        let page = vec![asset("1", "BTC", "Bitcoin"), asset("2", "ETH", "Ethereum")];
        let universe = vec![asset("9", "XRP", "XRP")];
        let favorites = HashSet::new();

        let plan = reconcile_page(&input(&page, Some(&universe), &favorites));

        assert_eq!(plan.mode, PaginationMode::ServerPaged);
        assert_eq!(plan.total_pages, 3);
        let entities: Vec<_> = plan.rows.iter().map(|row| &row.entity).collect();
        assert_eq!(entities, page.iter().collect::<Vec<_>>());
    }

    #[test]
    fn search_switches_to_universe_and_client_paging() {
        let page = vec![asset("1", "BTC", "Bitcoin")];
        let universe = vec![
            asset("1", "BTC", "Bitcoin"),
            asset("2", "BCH", "Bitcoin Cash"),
            asset("3", "ETH", "Ethereum"),
        ];
        let favorites = HashSet::new();

        let mut in_ = input(&page, Some(&universe), &favorites);
        in_.search = "bit";
        let plan = reconcile_page(&in_);

        assert_eq!(plan.mode, PaginationMode::ClientPaged);
        assert_eq!(plan.total_pages, 1);
        assert_eq!(plan.rows.len(), 2);
        assert_eq!(plan.rows[0].entity.id, "1");
        assert_eq!(plan.rows[1].entity.id, "2");
    }

    #[test]
    fn search_is_case_insensitive_and_trimmed() {
        let universe = vec![asset("1", "BTC", "Bitcoin")];
        let page: Vec<Asset> = Vec::new();
        let favorites = HashSet::new();

        let mut in_ = input(&page, Some(&universe), &favorites);
        in_.search = "  BITC  ";
        let plan = reconcile_page(&in_);

        assert_eq!(plan.rows.len(), 1);
    }

    #[test]
    fn missing_universe_degrades_filtering_to_current_page() {
        let page = vec![asset("1", "BTC", "Bitcoin"), asset("2", "ETH", "Ethereum")];
        let favorites = HashSet::new();

        let mut in_ = input(&page, None, &favorites);
        in_.search = "eth";
        let plan = reconcile_page(&in_);

        assert_eq!(plan.mode, PaginationMode::ClientPaged);
        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rows[0].entity.id, "2");
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence_order() {
        let universe = vec![
            asset("1", "BTC", "Bitcoin"),
            asset("2", "ETH", "Ethereum"),
            asset("1", "BTC", "Bitcoin again"),
            asset("3", "LTC", "Litecoin"),
        ];
        let page: Vec<Asset> = Vec::new();
        let favorites: HashSet<String> =
            ["1", "2", "3"].iter().map(|id| id.to_string()).collect();

        let mut in_ = input(&page, Some(&universe), &favorites);
        in_.favorites_only = true;
        let plan = reconcile_page(&in_);

        let ids: Vec<_> = plan.rows.iter().map(|row| row.entity.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(plan.rows[0].entity.full_name, "Bitcoin");
    }

    #[test]
    fn out_of_range_page_yields_empty_slice_not_error() {
        let universe: Vec<Asset> = (0..30)
            .map(|i| asset(&i.to_string(), &format!("C{i}"), &format!("Coin {i}")))
            .collect();
        let page: Vec<Asset> = Vec::new();
        let favorites = HashSet::new();

        let mut in_ = input(&page, Some(&universe), &favorites);
        in_.search = "coin";
        in_.requested_page = 5;
        let plan = reconcile_page(&in_);

        assert_eq!(plan.total_pages, 1);
        assert!(plan.rows.is_empty());
    }

    #[test]
    fn both_inputs_empty_yield_zero_pages() {
        let page: Vec<Asset> = Vec::new();
        let favorites = HashSet::new();

        let plan = reconcile_page(&input(&page, None, &favorites));
        assert_eq!(plan.total_pages, 0);
        assert!(plan.rows.is_empty());
    }

    #[test]
    fn ordinal_uses_requested_page_in_client_mode() {
        let universe: Vec<Asset> = (0..120)
            .map(|i| asset(&i.to_string(), &format!("C{i}"), &format!("Coin {i}")))
            .collect();
        let page: Vec<Asset> = Vec::new();
        let favorites = HashSet::new();

        let mut in_ = input(&page, Some(&universe), &favorites);
        in_.search = "coin";
        in_.requested_page = 2;
        let plan = reconcile_page(&in_);

        assert_eq!(plan.rows.len(), 20);
        assert_eq!(plan.rows[0].ordinal, 101);
        assert_eq!(plan.rows[19].ordinal, 120);
    }

    #[test]
    fn pages_for_count_rounds_up() {
        assert_eq!(pages_for_count(0, 100), 0);
        assert_eq!(pages_for_count(1, 100), 1);
        assert_eq!(pages_for_count(100, 100), 1);
        assert_eq!(pages_for_count(101, 100), 2);
        assert_eq!(pages_for_count(5, 0), 0);
    }
}
