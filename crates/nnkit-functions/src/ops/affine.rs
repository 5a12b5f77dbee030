//! Affine transform: y[k, :] = x[k, :] @ W + b for every batch row k.
//!
//! `W` is row-major `[input_loop_size, output_loop_size]`. Loops nest
//! row → input feature → output feature so the inner loop walks one
//! contiguous weight row.

use nnkit_core::{ReadView, WriteView};

use crate::geometry::LoopGeometry;

/// Affine over raw f32 buffers.
pub fn affine_f32(
    input: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    output: &mut [f32],
    geom: &LoopGeometry,
) {
    let n_in = geom.input_loop_size;
    let n_out = geom.output_loop_size;

    // Rows are contiguous and cover the whole output.
    output[..geom.output_size].fill(0.0);

    for k in 0..geom.base_loop_size {
        let x_row = &input[k * n_in..(k + 1) * n_in];
        let y_row = &mut output[k * n_out..(k + 1) * n_out];

        for (j, &u) in x_row.iter().enumerate() {
            let w_row = &weight[j * n_out..(j + 1) * n_out];
            for (y, &w) in y_row.iter_mut().zip(w_row) {
                *y += u * w;
            }
        }

        if let Some(bias) = bias {
            for (y, &b) in y_row.iter_mut().zip(&bias[..n_out]) {
                *y += b;
            }
        }
    }
}

/// Affine through resolved accessors, for any mix of storage types.
///
/// Performs the same arithmetic in the same order as [`affine_f32`], so for
/// all-F32 operands both produce identical bits.
pub fn affine_generic(
    input: ReadView<'_>,
    weight: ReadView<'_>,
    bias: Option<ReadView<'_>>,
    mut output: WriteView<'_>,
    geom: &LoopGeometry,
) {
    let n_in = geom.input_loop_size;
    let n_out = geom.output_loop_size;

    for i in 0..geom.output_size {
        output.set(i, 0.0);
    }

    for k in 0..geom.base_loop_size {
        let output_offset = k * n_out;
        let input_offset = k * n_in;

        for j in 0..n_in {
            let u = input.get(input_offset + j);
            let weight_offset = j * n_out;
            for i in 0..n_out {
                let opos = output_offset + i;
                let w = weight.get(weight_offset + i);
                output.set(opos, output.get(opos) + u * w);
            }
        }

        if let Some(bias) = &bias {
            for i in 0..n_out {
                let opos = output_offset + i;
                output.set(opos, output.get(opos) + bias.get(i));
            }
        }
    }
}
