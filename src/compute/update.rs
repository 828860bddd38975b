//! Per-cell state transition kernel.
//!
//! Consumes the interleaved neighbour table produced by the neighbour
//! counter and advances every cell one tick, writing the next excitation
//! field as it goes. The grid is split into row-major stripes updated in
//! parallel; stripes are independent because the transition reads only the
//! neighbour table and the cell itself.
//!
//! The vector path processes eight cells per iteration with mask arithmetic.
//! The scalar rule is the normative semantics; both narrow the
//! double-precision neighbour count to single precision before the strict
//! threshold compare, so the two paths are bit-identical.

use rayon::prelude::*;

use crate::schema::{Cell, CellType, SimConfig};

/// Transition-rule constants, lifted out of the configuration.
#[derive(Debug, Clone, Copy)]
pub struct UpdateParams {
    pub ap_duration: u32,
    pub rest_duration: u32,
    pub ap_threshold: f32,
}

impl From<&SimConfig> for UpdateParams {
    fn from(config: &SimConfig) -> Self {
        Self {
            ap_duration: config.ap_duration,
            rest_duration: config.rest_duration,
            ap_threshold: config.ap_threshold,
        }
    }
}

/// Advance one cell and return its emitted excitation for the next tick.
///
/// The decrement happens before the zero checks, and a tissue cell may only
/// fire when its counter was already zero before this tick; one that reaches
/// zero by the decrement turns refractory instead, regardless of the
/// neighbour count.
#[inline]
pub fn advance_cell(cell: &mut Cell, neighbour_count: f64, params: &UpdateParams) -> f64 {
    // Single-precision narrowing before the compare, matching the vector
    // pipeline's conversion of the IFFT output.
    let above_threshold = (neighbour_count as f32) > params.ap_threshold;
    let was_active = cell.state != 0;
    if was_active {
        cell.state -= 1;
    }

    match cell.cell_type {
        CellType::Pacemaker => {
            if cell.state == 0 {
                cell.state = params.ap_duration;
            }
        }
        CellType::RestingTissue => {
            if cell.state == 0 {
                cell.cell_type = CellType::Tissue;
            }
        }
        CellType::Tissue => {
            if cell.state == 0 && was_active {
                cell.cell_type = CellType::RestingTissue;
                cell.state = params.rest_duration;
            } else if cell.state == 0 && above_threshold {
                cell.state = params.ap_duration;
            }
        }
    }

    cell.emitted_excitation()
}

/// Advance one stripe of cells.
///
/// `neighbours` is the slice of the interleaved table covering exactly this
/// stripe (`cells.len() * num_orientations` entries).
pub fn advance_stripe(
    cells: &mut [Cell],
    state_out: &mut [f64],
    neighbours: &[f64],
    num_orientations: usize,
    params: &UpdateParams,
) {
    debug_assert_eq!(cells.len(), state_out.len());
    debug_assert_eq!(cells.len() * num_orientations, neighbours.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            // Safety: AVX2 support verified at runtime.
            unsafe { advance_stripe_avx2(cells, state_out, neighbours, num_orientations, params) };
            return;
        }
    }

    advance_stripe_scalar(cells, state_out, neighbours, num_orientations, params);
}

fn advance_stripe_scalar(
    cells: &mut [Cell],
    state_out: &mut [f64],
    neighbours: &[f64],
    num_orientations: usize,
    params: &UpdateParams,
) {
    for (i, (cell, slot)) in cells.iter_mut().zip(state_out.iter_mut()).enumerate() {
        let n = neighbours[i * num_orientations + cell.orientation as usize];
        *slot = advance_cell(cell, n, params);
    }
}

/// Eight cells per iteration with mask arithmetic; remainder cells scalar.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn advance_stripe_avx2(
    cells: &mut [Cell],
    state_out: &mut [f64],
    neighbours: &[f64],
    num_orientations: usize,
    params: &UpdateParams,
) {
    use std::arch::x86_64::{
        __m256i, _mm256_add_epi32, _mm256_and_si256, _mm256_andnot_si256, _mm256_castps_si256,
        _mm256_cmp_ps, _mm256_cmpeq_epi32, _mm256_loadu_ps, _mm256_loadu_si256, _mm256_or_si256,
        _mm256_set1_epi32, _mm256_set1_ps, _mm256_setzero_si256, _mm256_storeu_si256,
        _mm256_sub_epi32, _mm256_xor_si256, _CMP_GT_OQ,
    };

    const PACEMAKER: i32 = CellType::Pacemaker as i32;
    const TISSUE: i32 = CellType::Tissue as i32;
    const RESTING: i32 = CellType::RestingTissue as i32;

    let pacemaker_lanes = _mm256_set1_epi32(PACEMAKER);
    let tissue_lanes = _mm256_set1_epi32(TISSUE);
    let resting_lanes = _mm256_set1_epi32(RESTING);
    let zero = _mm256_setzero_si256();
    let one = _mm256_set1_epi32(1);
    let all_ones = _mm256_cmpeq_epi32(zero, zero);
    let ap = _mm256_set1_epi32(params.ap_duration as i32);
    let rest = _mm256_set1_epi32(params.rest_duration as i32);
    let threshold = _mm256_set1_ps(params.ap_threshold);
    let tissue_from_resting = _mm256_set1_epi32(TISSUE - RESTING);
    let resting_from_tissue = _mm256_set1_epi32(RESTING - TISSUE);

    let full = cells.len() - cells.len() % 8;
    let mut state_in = [0i32; 8];
    let mut type_in = [0i32; 8];
    let mut gathered = [0f32; 8];
    let mut state_result = [0i32; 8];
    let mut type_result = [0i32; 8];
    let mut emit_result = [0i32; 8];

    for base in (0..full).step_by(8) {
        for lane in 0..8 {
            let cell = &cells[base + lane];
            state_in[lane] = cell.state as i32;
            type_in[lane] = cell.cell_type as i32;
            // Narrow to single precision before the compare, eight counts
            // per register.
            gathered[lane] =
                neighbours[(base + lane) * num_orientations + cell.orientation as usize] as f32;
        }

        let neighbour_counts = _mm256_loadu_ps(gathered.as_ptr());
        let above = _mm256_castps_si256(_mm256_cmp_ps::<_CMP_GT_OQ>(neighbour_counts, threshold));

        let mut state = _mm256_loadu_si256(state_in.as_ptr() as *const __m256i);
        let types_orig = _mm256_loadu_si256(type_in.as_ptr() as *const __m256i);

        let was_active = _mm256_xor_si256(_mm256_cmpeq_epi32(state, zero), all_ones);

        // Active cells count down by one.
        state = _mm256_sub_epi32(state, _mm256_and_si256(was_active, one));
        let is_zero = _mm256_cmpeq_epi32(state, zero);

        let is_pacemaker = _mm256_cmpeq_epi32(types_orig, pacemaker_lanes);
        let is_tissue = _mm256_cmpeq_epi32(types_orig, tissue_lanes);
        let is_resting = _mm256_cmpeq_epi32(types_orig, resting_lanes);

        // Expired pacemakers restart their action potential.
        state = _mm256_add_epi32(
            state,
            _mm256_and_si256(ap, _mm256_and_si256(is_zero, is_pacemaker)),
        );

        // Expired refractory cells recover to plain tissue.
        let recovered = _mm256_and_si256(is_zero, is_resting);
        let mut types = _mm256_add_epi32(
            types_orig,
            _mm256_and_si256(tissue_from_resting, recovered),
        );

        // Tissue whose action potential ran out this tick turns refractory.
        let exhausted = _mm256_and_si256(is_zero, _mm256_and_si256(was_active, is_tissue));
        state = _mm256_add_epi32(state, _mm256_and_si256(rest, exhausted));
        types = _mm256_add_epi32(types, _mm256_and_si256(resting_from_tissue, exhausted));

        // Tissue that was already quiescent before the decrement fires on a
        // neighbour count strictly above the threshold.
        let quiescent = _mm256_andnot_si256(was_active, _mm256_and_si256(is_zero, is_tissue));
        let fired = _mm256_and_si256(above, quiescent);
        state = _mm256_add_epi32(state, _mm256_and_si256(ap, fired));

        // Refractory cells emit no excitation.
        let emits = _mm256_or_si256(is_pacemaker, _mm256_cmpeq_epi32(types, tissue_lanes));
        let emitted = _mm256_and_si256(state, emits);

        _mm256_storeu_si256(state_result.as_mut_ptr() as *mut __m256i, state);
        _mm256_storeu_si256(type_result.as_mut_ptr() as *mut __m256i, types);
        _mm256_storeu_si256(emit_result.as_mut_ptr() as *mut __m256i, emitted);

        for lane in 0..8 {
            let cell = &mut cells[base + lane];
            cell.state = state_result[lane] as u32;
            cell.cell_type = decode_type(type_result[lane]);
            state_out[base + lane] = emit_result[lane] as f64;
        }
    }

    // Stripe lengths are not always a lane multiple; finish scalar.
    for i in full..cells.len() {
        let n = neighbours[i * num_orientations + cells[i].orientation as usize];
        state_out[i] = advance_cell(&mut cells[i], n, params);
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn decode_type(v: i32) -> CellType {
    match v {
        0 => CellType::Pacemaker,
        1 => CellType::Tissue,
        2 => CellType::RestingTissue,
        other => unreachable!("cell type arithmetic produced {}", other),
    }
}

/// Advance the whole grid in `stripes` parallel row-major stripes. The last
/// stripe absorbs any remainder.
pub fn advance_cells(
    cells: &mut [Cell],
    state_array: &mut [f64],
    neighbours: &[f64],
    num_orientations: usize,
    params: &UpdateParams,
    stripes: usize,
) {
    assert_eq!(cells.len(), state_array.len());
    assert_eq!(cells.len() * num_orientations, neighbours.len());

    let stripe_len = cells.len().div_ceil(stripes.max(1)).max(1);
    cells
        .par_chunks_mut(stripe_len)
        .zip(state_array.par_chunks_mut(stripe_len))
        .zip(neighbours.par_chunks(stripe_len * num_orientations))
        .for_each(|((cell_stripe, state_stripe), neighbour_stripe)| {
            advance_stripe(
                cell_stripe,
                state_stripe,
                neighbour_stripe,
                num_orientations,
                params,
            );
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> UpdateParams {
        UpdateParams {
            ap_duration: 8,
            rest_duration: 4,
            ap_threshold: 16.0,
        }
    }

    fn cell(cell_type: CellType, state: u32) -> Cell {
        Cell {
            cell_type,
            state,
            orientation: 0,
        }
    }

    #[test]
    fn test_pacemaker_refires_at_zero() {
        let mut c = cell(CellType::Pacemaker, 0);
        let emitted = advance_cell(&mut c, 0.0, &params());
        assert_eq!(c.state, 8);
        assert_eq!(emitted, 8.0);
    }

    #[test]
    fn test_pacemaker_counts_down_and_wraps() {
        let mut c = cell(CellType::Pacemaker, 3);
        advance_cell(&mut c, 0.0, &params());
        assert_eq!(c.state, 2);

        // Reaching zero by the decrement restarts immediately.
        let mut c = cell(CellType::Pacemaker, 1);
        advance_cell(&mut c, 0.0, &params());
        assert_eq!(c.state, 8);
        assert_eq!(c.cell_type, CellType::Pacemaker);
    }

    #[test]
    fn test_pacemaker_never_rests() {
        let mut c = cell(CellType::Pacemaker, 5);
        for _ in 0..40 {
            advance_cell(&mut c, 100.0, &params());
            assert_eq!(c.cell_type, CellType::Pacemaker);
            assert!(c.state <= 8);
        }
    }

    #[test]
    fn test_tissue_fires_above_threshold() {
        let mut c = cell(CellType::Tissue, 0);
        let emitted = advance_cell(&mut c, 17.0, &params());
        assert_eq!(c.cell_type, CellType::Tissue);
        assert_eq!(c.state, 8);
        assert_eq!(emitted, 8.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut c = cell(CellType::Tissue, 0);
        advance_cell(&mut c, 16.0, &params());
        assert_eq!(c.state, 0, "equality must not fire");
    }

    #[test]
    fn test_threshold_compares_in_single_precision() {
        // Just above the threshold in f64, but rounds to exactly 16.0 in f32.
        let barely = 16.000000001_f64;
        assert_eq!(barely as f32, 16.0f32);
        let mut c = cell(CellType::Tissue, 0);
        advance_cell(&mut c, barely, &params());
        assert_eq!(c.state, 0);

        // Above threshold even after narrowing.
        let mut c = cell(CellType::Tissue, 0);
        advance_cell(&mut c, 16.001, &params());
        assert_eq!(c.state, 8);
    }

    #[test]
    fn test_tissue_ap_expiry_turns_refractory() {
        // A cell at state 1 with any neighbour count turns refractory; the
        // decrement wins over re-firing.
        let mut c = cell(CellType::Tissue, 1);
        let emitted = advance_cell(&mut c, 100.0, &params());
        assert_eq!(c.cell_type, CellType::RestingTissue);
        assert_eq!(c.state, 4);
        assert_eq!(emitted, 0.0);
    }

    #[test]
    fn test_active_tissue_counts_down() {
        let mut c = cell(CellType::Tissue, 5);
        let emitted = advance_cell(&mut c, 100.0, &params());
        assert_eq!(c.cell_type, CellType::Tissue);
        assert_eq!(c.state, 4);
        assert_eq!(emitted, 4.0);
    }

    #[test]
    fn test_refractory_recovery() {
        let mut c = cell(CellType::RestingTissue, 1);
        let emitted = advance_cell(&mut c, 100.0, &params());
        assert_eq!(c.cell_type, CellType::Tissue);
        assert_eq!(c.state, 0);
        assert_eq!(emitted, 0.0);
    }

    #[test]
    fn test_refractory_never_emits() {
        let mut c = cell(CellType::RestingTissue, 3);
        let emitted = advance_cell(&mut c, 100.0, &params());
        assert_eq!(c.cell_type, CellType::RestingTissue);
        assert_eq!(c.state, 2);
        assert_eq!(emitted, 0.0);
    }

    #[test]
    fn test_recovered_cell_waits_a_tick_before_firing() {
        // Refractory expiry and re-firing never happen in the same tick.
        let mut c = cell(CellType::RestingTissue, 1);
        advance_cell(&mut c, 100.0, &params());
        assert_eq!((c.cell_type, c.state), (CellType::Tissue, 0));
        advance_cell(&mut c, 100.0, &params());
        assert_eq!((c.cell_type, c.state), (CellType::Tissue, 8));
    }

    fn mixed_population(len: usize) -> (Vec<Cell>, Vec<f64>) {
        let mut cells = Vec::with_capacity(len);
        let mut neighbours = Vec::with_capacity(len);
        let mut seed = 0x9e3779b97f4a7c15u64;
        for i in 0..len {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let cell_type = match seed % 3 {
                0 => CellType::Pacemaker,
                1 => CellType::Tissue,
                _ => CellType::RestingTissue,
            };
            let state = (seed >> 8) as u32 % 9;
            cells.push(Cell {
                cell_type,
                state,
                orientation: 0,
            });
            neighbours.push(((i * 37) % 41) as f64);
        }
        (cells, neighbours)
    }

    #[test]
    fn test_stripe_matches_per_cell_rule() {
        let (mut cells, neighbours) = mixed_population(67);
        let mut expected_cells = cells.clone();
        let mut expected_state = vec![0.0f64; cells.len()];
        for (i, cell) in expected_cells.iter_mut().enumerate() {
            expected_state[i] = advance_cell(cell, neighbours[i], &params());
        }

        let mut state = vec![0.0f64; cells.len()];
        advance_stripe(&mut cells, &mut state, &neighbours, 1, &params());

        assert_eq!(cells, expected_cells);
        assert_eq!(state, expected_state);
    }

    #[test]
    fn test_scalar_stripe_matches_dispatch() {
        let (mut dispatched, neighbours) = mixed_population(128);
        let mut scalar = dispatched.clone();

        let mut state_a = vec![0.0f64; dispatched.len()];
        let mut state_b = vec![0.0f64; scalar.len()];

        advance_stripe(&mut dispatched, &mut state_a, &neighbours, 1, &params());
        advance_stripe_scalar(&mut scalar, &mut state_b, &neighbours, 1, &params());

        assert_eq!(dispatched, scalar);
        assert_eq!(state_a, state_b);
    }

    #[test]
    fn test_striped_update_matches_single_stripe() {
        let (cells, neighbours) = mixed_population(100);

        let mut single = cells.clone();
        let mut single_state = vec![0.0f64; cells.len()];
        advance_cells(&mut single, &mut single_state, &neighbours, 1, &params(), 1);

        let mut striped = cells;
        let mut striped_state = vec![0.0f64; striped.len()];
        advance_cells(&mut striped, &mut striped_state, &neighbours, 1, &params(), 8);

        assert_eq!(single, striped);
        assert_eq!(single_state, striped_state);
    }

    #[test]
    fn test_orientation_selects_table_column() {
        // Two orientations: the cell reads only its own column.
        let mut cells = vec![
            Cell {
                cell_type: CellType::Tissue,
                state: 0,
                orientation: 1,
            },
            Cell {
                cell_type: CellType::Tissue,
                state: 0,
                orientation: 0,
            },
        ];
        // Cell 0: column 1 above threshold. Cell 1: column 0 below.
        let neighbours = vec![0.0, 20.0, 3.0, 50.0];
        let mut state = vec![0.0f64; 2];
        advance_stripe(&mut cells, &mut state, &neighbours, 2, &params());

        assert_eq!(cells[0].state, 8);
        assert_eq!(cells[1].state, 0);
    }

    #[test]
    fn test_state_stays_bounded() {
        let (mut cells, neighbours) = mixed_population(256);
        let mut state = vec![0.0f64; cells.len()];
        for _ in 0..50 {
            advance_stripe(&mut cells, &mut state, &neighbours, 1, &params());
            for (cell, slot) in cells.iter().zip(state.iter()) {
                assert!(cell.state <= 8);
                if cell.cell_type == CellType::RestingTissue {
                    assert_eq!(*slot, 0.0);
                }
            }
        }
    }
}
