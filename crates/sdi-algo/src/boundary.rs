//! Outflow boundary cells for polygon-typed outfalls.
//!
//! An outfall drawn as a boundary polygon on the surface grid only makes
//! sense on the edge of the domain. Each outfall cell is classified from
//! its eight-neighbour mask through [`NEIGHBORHOOD_ACTIONS`]:
//!
//! | Mask | Action |
//! |------|--------|
//! | all eight neighbours present | interior, outfall dropped |
//! | a diagonal missing while both adjacent cardinals exist | diagonal corner, dropped |
//! | exactly one cardinal missing | border, stage-1 cell is the opposite neighbour |
//! | anything else | border only |
//!
//! Time-stage outfalls additionally get a stage-1 cell (the interior
//! neighbour picked by the table) and a stage-2 cell found by walking
//! further inward until a cell with all four cardinal neighbours turns up.
//! A cell belongs to the first outfall that claims it.

use hashbrown::{HashMap, HashSet};
use sdi_core::{CellId, Diagnostics, Direction, GridService, IssueKind, SdiResult};
use sdi_store::{OutflowCell, OutflowRole, SchematizedOutfall, Store};
use serde::Serialize;
use tracing::{debug, info};

/// Boundary type of a polygon-typed outfall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutflowKind {
    NoOutflow,
    Floodplain,
    TimeStage,
    ChannelTimeStage,
    CombinedFree,
}

impl OutflowKind {
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code.trim().to_ascii_uppercase().as_str() {
            "NO_OUTFLOW" => OutflowKind::NoOutflow,
            "FLOODPLAIN" => OutflowKind::Floodplain,
            "TIME_STAGE" => OutflowKind::TimeStage,
            "CHANNEL_TIME_STAGE" => OutflowKind::ChannelTimeStage,
            "COMBINED_FREE" => OutflowKind::CombinedFree,
            _ => return None,
        };
        Some(kind)
    }

    pub fn code(&self) -> &'static str {
        match self {
            OutflowKind::NoOutflow => "NO_OUTFLOW",
            OutflowKind::Floodplain => "FLOODPLAIN",
            OutflowKind::TimeStage => "TIME_STAGE",
            OutflowKind::ChannelTimeStage => "CHANNEL_TIME_STAGE",
            OutflowKind::CombinedFree => "COMBINED_FREE",
        }
    }
}

/// A schematized outfall whose cell takes part in boundary selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryOutfall {
    pub name: String,
    pub cell: CellId,
    pub kind: OutflowKind,
}

impl BoundaryOutfall {
    pub fn new(name: impl Into<String>, cell: CellId, kind: OutflowKind) -> Self {
        Self {
            name: name.into(),
            cell,
            kind,
        }
    }
}

/// Pair schematized outfalls with the boundary type the host assigns them.
/// Outfalls for which `kind_of` returns None are not polygon-typed and are
/// left out.
pub fn boundary_outfalls(
    outfalls: &[SchematizedOutfall],
    kind_of: impl Fn(&str) -> Option<OutflowKind>,
) -> Vec<BoundaryOutfall> {
    outfalls
        .iter()
        .filter_map(|o| kind_of(&o.name).map(|kind| BoundaryOutfall::new(&o.name, o.grid, kind)))
        .collect()
}

/// What a neighbourhood mask means for the cell at its centre
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskAction {
    Interior,
    Diagonal,
    /// Border cell; the direction of its stage-1 neighbour when exactly one
    /// cardinal neighbour is missing
    Border(Option<Direction>),
}

const fn has(mask: u8, dir: Direction) -> bool {
    mask & (1 << dir as u8) != 0
}

/// Diagonals with their two adjacent cardinals
const CORNERS: [(Direction, Direction, Direction); 4] = [
    (Direction::NorthEast, Direction::North, Direction::East),
    (Direction::SouthEast, Direction::South, Direction::East),
    (Direction::SouthWest, Direction::South, Direction::West),
    (Direction::NorthWest, Direction::North, Direction::West),
];

const fn classify(mask: u8) -> MaskAction {
    if mask == 0xFF {
        return MaskAction::Interior;
    }
    let mut i = 0;
    while i < CORNERS.len() {
        let (diagonal, a, b) = CORNERS[i];
        if !has(mask, diagonal) && has(mask, a) && has(mask, b) {
            return MaskAction::Diagonal;
        }
        i += 1;
    }
    let stage1 = match (
        has(mask, Direction::North),
        has(mask, Direction::East),
        has(mask, Direction::South),
        has(mask, Direction::West),
    ) {
        (false, true, true, true) => Some(Direction::South),
        (true, false, true, true) => Some(Direction::West),
        (true, true, false, true) => Some(Direction::North),
        (true, true, true, false) => Some(Direction::East),
        _ => None,
    };
    MaskAction::Border(stage1)
}

/// Action for every eight-neighbour mask, indexed by [`sdi_core::Neighbors::mask`]
pub const NEIGHBORHOOD_ACTIONS: [MaskAction; 256] = {
    let mut table = [MaskAction::Border(None); 256];
    let mut mask = 0;
    while mask < 256 {
        table[mask] = classify(mask as u8);
        mask += 1;
    }
    table
};

/// Progress of one outfall through selection. States only move forward;
/// the last three are terminal for a kept outfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    Unvisited,
    Interior,
    Diagonal,
    BorderOnly,
    Stage1Marked,
    Stage2Marked,
}

impl SelectionState {
    /// Move to `next` if that is forward from here
    fn advance(self, next: SelectionState) -> SelectionState {
        if next > self {
            next
        } else {
            self
        }
    }

    /// Whether the outfall stays in the schematized set
    pub fn is_kept(&self) -> bool {
        matches!(
            self,
            SelectionState::BorderOnly | SelectionState::Stage1Marked | SelectionState::Stage2Marked
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BoundarySelection {
    /// Claimed cells in discovery order
    pub cells: Vec<OutflowCell>,
    /// Final state per outfall, in input order
    pub states: Vec<(String, SelectionState)>,
    pub diagnostics: Diagnostics,
}

impl BoundarySelection {
    pub fn state_of(&self, outfall: &str) -> Option<SelectionState> {
        self.states
            .iter()
            .find(|(name, _)| name == outfall)
            .map(|(_, state)| *state)
    }

    /// Outfalls removed from the schematized set
    pub fn dropped(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|(_, state)| matches!(state, SelectionState::Interior | SelectionState::Diagonal))
            .map(|(name, _)| name.as_str())
    }

    pub fn cells_with_role(&self, role: OutflowRole) -> impl Iterator<Item = &OutflowCell> {
        self.cells.iter().filter(move |c| c.role == role)
    }
}

struct Claims {
    cells: Vec<OutflowCell>,
    by_cell: HashMap<CellId, usize>,
}

impl Claims {
    fn new() -> Self {
        Self {
            cells: Vec::new(),
            by_cell: HashMap::new(),
        }
    }

    fn is_claimed(&self, cell: CellId) -> bool {
        self.by_cell.contains_key(&cell)
    }

    /// Claim `cell`; the first claim wins
    fn claim(&mut self, cell: CellId, outfall: &str, role: OutflowRole) -> Result<(), &OutflowCell> {
        if let Some(&idx) = self.by_cell.get(&cell) {
            return Err(&self.cells[idx]);
        }
        self.by_cell.insert(cell, self.cells.len());
        self.cells.push(OutflowCell {
            grid: cell,
            outfall: outfall.to_string(),
            role,
        });
        Ok(())
    }
}

/// Walk from `from` in `dir` until a cell with all four cardinal neighbours
/// that nobody has claimed yet; None when the walk leaves the domain
fn walk_inward(grid: &dyn GridService, from: CellId, dir: Direction, claims: &Claims) -> Option<CellId> {
    let mut seen = HashSet::new();
    let mut cell = grid.neighbors(from).get(dir)?;
    while seen.insert(cell) {
        let neighbors = grid.neighbors(cell);
        if neighbors.all_cardinals_present() && !claims.is_claimed(cell) {
            return Some(cell);
        }
        cell = neighbors.get(dir)?;
    }
    None
}

/// Stage-2 search: first along the stage-1 direction, then north, east,
/// south and west in turn
fn find_stage2(grid: &dyn GridService, stage1: CellId, inward: Direction, claims: &Claims) -> Option<CellId> {
    std::iter::once(inward)
        .chain(Direction::CARDINALS.into_iter().filter(|d| *d != inward))
        .find_map(|dir| walk_inward(grid, stage1, dir, claims))
}

/// Classify every outfall cell and pick the border, stage-1 and stage-2
/// cells. Pure; see [`apply_boundary_selection`] for the persisted version.
pub fn select_boundary_cells(grid: &dyn GridService, outfalls: &[BoundaryOutfall]) -> BoundarySelection {
    let mut claims = Claims::new();
    let mut diagnostics = Diagnostics::new();
    let mut states = Vec::with_capacity(outfalls.len());

    for outfall in outfalls {
        let name = outfall.name.as_str();
        let mut state = SelectionState::Unvisited;

        if grid.cell(outfall.cell).is_none() {
            diagnostics.add_warning_with_entity(
                IssueKind::Domain,
                &format!("cell {} is not part of the grid", outfall.cell),
                name,
            );
            states.push((outfall.name.clone(), state));
            continue;
        }

        let mask = grid.neighbors(outfall.cell).mask();
        let action = NEIGHBORHOOD_ACTIONS[mask as usize];
        debug!(outfall = name, cell = %outfall.cell, mask, ?action, "classified outfall cell");

        let stage1_dir = match action {
            MaskAction::Interior => {
                states.push((outfall.name.clone(), state.advance(SelectionState::Interior)));
                continue;
            }
            MaskAction::Diagonal => {
                states.push((outfall.name.clone(), state.advance(SelectionState::Diagonal)));
                continue;
            }
            MaskAction::Border(dir) => dir,
        };

        if let Err(holder) = claims.claim(outfall.cell, name, OutflowRole::Border) {
            diagnostics.add_warning_with_entity(
                IssueKind::Duplicate,
                &format!("cell {} already belongs to outfall '{}'", outfall.cell, holder.outfall),
                name,
            );
        }
        state = state.advance(SelectionState::BorderOnly);

        let inward = match (outfall.kind, stage1_dir) {
            (OutflowKind::TimeStage, Some(dir)) => dir,
            (OutflowKind::TimeStage, None) => {
                diagnostics.add_warning_with_entity(
                    IssueKind::Domain,
                    "no single interior neighbour for a time-stage cell",
                    name,
                );
                states.push((outfall.name.clone(), state));
                continue;
            }
            _ => {
                states.push((outfall.name.clone(), state));
                continue;
            }
        };

        // the table only names directions whose neighbour exists
        let Some(stage1) = grid.neighbors(outfall.cell).get(inward) else {
            states.push((outfall.name.clone(), state));
            continue;
        };
        if let Err(holder) = claims.claim(stage1, name, OutflowRole::Stage1) {
            diagnostics.add_warning_with_entity(
                IssueKind::Duplicate,
                &format!("stage-1 cell {stage1} already belongs to outfall '{}'", holder.outfall),
                name,
            );
            states.push((outfall.name.clone(), state));
            continue;
        }
        state = state.advance(SelectionState::Stage1Marked);

        match find_stage2(grid, stage1, inward, &claims) {
            Some(stage2) => {
                // unclaimed by construction
                let _ = claims.claim(stage2, name, OutflowRole::Stage2);
                state = state.advance(SelectionState::Stage2Marked);
            }
            None => diagnostics.add_warning_with_entity(
                IssueKind::Domain,
                &format!("no interior cell behind stage-1 cell {stage1}"),
                name,
            ),
        }
        states.push((outfall.name.clone(), state));
    }

    BoundarySelection {
        cells: claims.cells,
        states,
        diagnostics,
    }
}

/// Run boundary selection and persist it: the outflow cell table is
/// replaced and dropped outfalls leave the schematized outfall layer
pub fn apply_boundary_selection(
    store: &mut Store,
    grid: &dyn GridService,
    outfalls: &[BoundaryOutfall],
) -> SdiResult<BoundarySelection> {
    let selection = select_boundary_cells(grid, outfalls);
    store.replace_outflow_cells(&selection.cells)?;

    let dropped: HashSet<&str> = selection.dropped().collect();
    if !dropped.is_empty() {
        let inlets = store.schematized_inlets()?;
        let kept: Vec<SchematizedOutfall> = store
            .schematized_outfalls()?
            .into_iter()
            .filter(|o| !dropped.contains(o.name.as_str()))
            .collect();
        store.replace_schematized(&inlets, &kept, &[])?;
    }

    info!(
        outfalls = outfalls.len(),
        cells = selection.cells.len(),
        dropped = dropped.len(),
        "outflow boundary cells selected"
    );
    drop(dropped);
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdi_core::{Point, RegularGrid};

    fn bits(dirs: &[Direction]) -> u8 {
        dirs.iter().fold(0, |m, d| m | d.bit())
    }

    #[test]
    fn test_table_matches_rules() {
        use Direction::*;
        assert_eq!(NEIGHBORHOOD_ACTIONS[0xFF], MaskAction::Interior);
        // inside corner of an L-shaped domain
        let notch = 0xFF & !NorthEast.bit();
        assert_eq!(NEIGHBORHOOD_ACTIONS[notch as usize], MaskAction::Diagonal);

        let west_edge = bits(&[North, NorthEast, East, SouthEast, South]);
        assert_eq!(NEIGHBORHOOD_ACTIONS[west_edge as usize], MaskAction::Border(Some(East)));
        let south_edge = bits(&[West, NorthWest, North, NorthEast, East]);
        assert_eq!(NEIGHBORHOOD_ACTIONS[south_edge as usize], MaskAction::Border(Some(North)));
        let north_edge = bits(&[West, SouthWest, South, SouthEast, East]);
        assert_eq!(NEIGHBORHOOD_ACTIONS[north_edge as usize], MaskAction::Border(Some(South)));
        let east_edge = bits(&[North, NorthWest, West, SouthWest, South]);
        assert_eq!(NEIGHBORHOOD_ACTIONS[east_edge as usize], MaskAction::Border(Some(West)));

        let corner = bits(&[North, NorthEast, East]);
        assert_eq!(NEIGHBORHOOD_ACTIONS[corner as usize], MaskAction::Border(None));
    }

    #[test]
    fn test_state_only_moves_forward() {
        let s = SelectionState::Stage1Marked;
        assert_eq!(s.advance(SelectionState::BorderOnly), SelectionState::Stage1Marked);
        assert_eq!(s.advance(SelectionState::Stage2Marked), SelectionState::Stage2Marked);
        assert!(!SelectionState::Diagonal.is_kept());
    }

    #[test]
    fn test_non_time_stage_gets_border_only() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
        let west = grid.cell_id(0, 1).unwrap();
        let selection = select_boundary_cells(
            &grid,
            &[BoundaryOutfall::new("O1", west, OutflowKind::Floodplain)],
        );
        assert_eq!(selection.state_of("O1"), Some(SelectionState::BorderOnly));
        assert_eq!(selection.cells.len(), 1);
        assert_eq!(selection.cells[0].role, OutflowRole::Border);
    }

    #[test]
    fn test_first_claim_wins() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
        let west = grid.cell_id(0, 1).unwrap();
        let selection = select_boundary_cells(
            &grid,
            &[
                BoundaryOutfall::new("O1", west, OutflowKind::NoOutflow),
                BoundaryOutfall::new("O2", west, OutflowKind::CombinedFree),
            ],
        );
        assert_eq!(selection.cells.len(), 1);
        assert_eq!(selection.cells[0].outfall, "O1");
        assert_eq!(selection.diagnostics.count_of_kind(IssueKind::Duplicate), 1);
    }

    #[test]
    fn test_unknown_cell_is_reported() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 2, 2);
        let selection = select_boundary_cells(
            &grid,
            &[BoundaryOutfall::new("O1", CellId::new(99), OutflowKind::TimeStage)],
        );
        assert_eq!(selection.state_of("O1"), Some(SelectionState::Unvisited));
        assert!(selection.cells.is_empty());
        assert_eq!(selection.diagnostics.count_of_kind(IssueKind::Domain), 1);
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(OutflowKind::from_code("time_stage"), Some(OutflowKind::TimeStage));
        assert_eq!(OutflowKind::from_code("FREE"), None);
        assert_eq!(OutflowKind::ChannelTimeStage.code(), "CHANNEL_TIME_STAGE");
    }
}
