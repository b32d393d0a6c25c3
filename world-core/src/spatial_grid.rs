//! C6: per-world/cell 3x3 chunk loader and neighbor query for references
//! (§4.6).

use std::collections::{HashMap, HashSet};

use crate::espm::EspmBrowser;
use crate::form::FormId;
use crate::registry::FormRegistry;

type ChunkCoord = (i16, i16);

#[derive(Default)]
struct WorldGrid {
    loaded_chunks: HashMap<ChunkCoord, bool>,
    /// `(cx, cy) -> set<FormId>` of object references seen in that chunk.
    cells: HashMap<ChunkCoord, HashSet<FormId>>,
}

/// Reentrancy guard + per-world grids (§4.6, §5 `chunk_loading_in_progress`).
#[derive(Default)]
pub struct SpatialGrid {
    worlds: HashMap<FormId, WorldGrid>,
    chunk_loading_in_progress: bool,
}

impl SpatialGrid {
    pub fn new() -> Self {
        SpatialGrid::default()
    }

    pub fn is_chunk_loaded(&self, world: FormId, cx: i16, cy: i16) -> bool {
        self.worlds
            .get(&world)
            .map(|g| *g.loaded_chunks.get(&(cx, cy)).unwrap_or(&false))
            .unwrap_or(false)
    }

    /// Records that a reference with this `FormId` sits in `(cx, cy)` of
    /// `world`. Called by the lazy loader as it materializes forms - the
    /// grid and the registry stay independently owned (no back pointer).
    pub fn insert_reference(&mut self, world: FormId, cx: i16, cy: i16, form_id: FormId) {
        self.worlds
            .entry(world)
            .or_default()
            .cells
            .entry((cx, cy))
            .or_default()
            .insert(form_id);
    }

    /// `references_at(world, cx, cy)` (§4.6). If ESPM is attached and no
    /// pre-load is already in flight, sets the reentrancy guard and walks
    /// the 3x3 skirt around `(cx, cy)`, loading any not-yet-loaded chunk
    /// via `browser.records_at_pos` + `loader.attach_record`, then returns
    /// the pre-populated neighbor set.
    pub fn references_at(
        &mut self,
        browser: Option<&dyn EspmBrowser>,
        loader: &mut crate::espm::EspmLazyLoader,
        registry: &mut FormRegistry,
        world: FormId,
        cx: i16,
        cy: i16,
    ) -> HashSet<FormId> {
        if let (Some(browser), false) = (browser, self.chunk_loading_in_progress) {
            self.chunk_loading_in_progress = true;
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let coord = (cx + dx, cy + dy);
                    if self.is_chunk_loaded(world, coord.0, coord.1) {
                        continue;
                    }
                    let per_file_records = browser.records_at_pos(world, coord.0 as i32, coord.1 as i32);
                    for (file_idx, records) in per_file_records.into_iter().enumerate() {
                        let mapping = browser.get_mapping(file_idx as u32);
                        for record in records {
                            if loader.attach_record(browser, registry, record, &mapping) {
                                let form_id = mapping.map(record.id);
                                self.insert_reference(world, coord.0, coord.1, form_id);
                            }
                        }
                    }
                    self.worlds
                        .entry(world)
                        .or_default()
                        .loaded_chunks
                        .insert(coord, true);
                }
            }
            self.chunk_loading_in_progress = false;
        }

        let Some(grid) = self.worlds.get(&world) else {
            return HashSet::new();
        };
        let mut result = HashSet::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = grid.cells.get(&(cx + dx, cy + dy)) {
                    result.extend(ids.iter().copied());
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::espm::{FileMapping, LookupHit, Record};

    struct EmptyBrowser;

    impl EspmBrowser for EmptyBrowser {
        fn lookup_by_id(&self, _id: FormId) -> Option<&Record> {
            None
        }
        fn lookup_by_id_all(&self, _id: FormId) -> Vec<LookupHit<'_>> {
            Vec::new()
        }
        fn get_mapping(&self, file_idx: u32) -> FileMapping {
            FileMapping { file_idx }
        }
        fn records_at_pos(&self, _world: FormId, _cx: i32, _cy: i32) -> Vec<Vec<&Record>> {
            Vec::new()
        }
        fn file_names(&self) -> &[String] {
            &[]
        }
    }

    #[test]
    fn references_at_marks_3x3_skirt_loaded() {
        let mut grid = SpatialGrid::new();
        let browser = EmptyBrowser;
        let mut loader = crate::espm::EspmLazyLoader::new();
        let mut registry = FormRegistry::new(16);
        grid.references_at(Some(&browser), &mut loader, &mut registry, 0x3c, 0, 0);
        for dx in -1..=1 {
            for dy in -1..=1 {
                assert!(grid.is_chunk_loaded(0x3c, dx, dy));
            }
        }
        assert!(!grid.is_chunk_loaded(0x3c, 2, 2));
    }

    #[test]
    fn second_call_with_same_args_reuses_loaded_chunks() {
        let mut grid = SpatialGrid::new();
        grid.insert_reference(0x3c, 0, 0, 42);
        grid.worlds.get_mut(&0x3c).unwrap().loaded_chunks.insert((0, 0), true);
        let browser = EmptyBrowser;
        let mut loader = crate::espm::EspmLazyLoader::new();
        let mut registry = FormRegistry::new(16);
        let first = grid.references_at(Some(&browser), &mut loader, &mut registry, 0x3c, 0, 0);
        let second = grid.references_at(Some(&browser), &mut loader, &mut registry, 0x3c, 0, 0);
        assert_eq!(first, second);
        assert!(first.contains(&42));
    }
}
