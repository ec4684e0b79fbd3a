use crate::core::weight::WeightResolver;
use crate::domain::model::{
    ManifestSummary, Parcel, ParcelKind, ParcelLine, ProductId, UnpackableLine,
};
use crate::domain::ports::WeightSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Zero-weight units are clamped to this internally so an all-zero-weight
/// item set still produces a parcel instead of collapsing to nothing.
const EPSILON_UNIT_G: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackConstraints {
    pub max_weight_kg: f64,
    pub satchel_limit_kg: f64,
    /// cm3 per kg, carrier volumetric convention.
    pub volumetric_factor: f64,
    /// Soft cap on total transfer weight; exceeding it logs a warning but
    /// packing continues.
    pub transfer_ceiling_kg: Option<f64>,
}

impl Default for PackConstraints {
    fn default() -> Self {
        Self {
            max_weight_kg: 25.0,
            satchel_limit_kg: 2.0,
            volumetric_factor: 5000.0,
            transfer_ceiling_kg: Some(30.0),
        }
    }
}

/// One item line as the packer sees it: already resolved to a unit weight.
#[derive(Debug, Clone)]
pub struct PackLine {
    pub product_id: ProductId,
    pub qty: u32,
    pub unit_weight_g: u32,
    pub unit_volume_cm3: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct PackOutcome {
    pub parcels: Vec<Parcel>,
    pub unpackable: Vec<UnpackableLine>,
    pub missing_dimensions: Vec<ProductId>,
}

impl PackOutcome {
    pub fn summary(&self, volumetric_factor: f64) -> ManifestSummary {
        ManifestSummary::from_parcels(
            &self.parcels,
            self.missing_dimensions.clone(),
            volumetric_factor,
        )
    }
}

/// Weight-first greedy bin packing, deterministic and order-stable.
///
/// Lines are sorted by total weight descending (ties by product id), small
/// lines become standalone satchels, the rest fill boxes greedily, and a
/// line too heavy for one box is split across as many boxes as needed with
/// exact quantity conservation.
pub struct BoxPacker {
    constraints: PackConstraints,
}

impl BoxPacker {
    pub fn new(constraints: PackConstraints) -> Self {
        Self { constraints }
    }

    pub fn constraints(&self) -> &PackConstraints {
        &self.constraints
    }

    pub fn pack(&self, lines: &[PackLine]) -> PackOutcome {
        self.pack_with_oversized(lines, &HashSet::new())
    }

    /// `oversized_ok` lists products the operator has explicitly allowed to
    /// ship as single over-limit units; anything else heavier than the box
    /// cap per unit is reported as unpackable instead.
    pub fn pack_with_oversized(
        &self,
        lines: &[PackLine],
        oversized_ok: &HashSet<ProductId>,
    ) -> PackOutcome {
        let mut outcome = PackOutcome::default();

        let max_g = kg_to_g(self.constraints.max_weight_kg);
        let satchel_g = kg_to_g(self.constraints.satchel_limit_kg);

        let mut work: Vec<&PackLine> = lines.iter().filter(|l| l.qty > 0).collect();
        if work.is_empty() {
            return outcome;
        }

        // Deterministic order: heaviest line first, ties by product id.
        work.sort_by(|a, b| {
            line_total_g(b)
                .cmp(&line_total_g(a))
                .then_with(|| a.product_id.cmp(&b.product_id))
        });

        let total_g: u64 = work.iter().map(|l| line_total_g(l)).sum();
        if let Some(ceiling_kg) = self.constraints.transfer_ceiling_kg {
            if total_g > kg_to_g(ceiling_kg) {
                tracing::warn!(
                    "Transfer weight {:.2} kg exceeds the {:.0} kg ceiling",
                    total_g as f64 / 1000.0,
                    ceiling_kg
                );
            }
        }

        let mut builder = ParcelBuilder::new(&self.constraints);

        for line in work {
            let unit_g = effective_unit_g(line);
            let total = line_total_g(line);

            if line.unit_volume_cm3.is_none()
                && !outcome.missing_dimensions.contains(&line.product_id)
            {
                outcome.missing_dimensions.push(line.product_id.clone());
            }

            if unit_g > max_g {
                if oversized_ok.contains(&line.product_id) {
                    // Permitted exception: one flagged parcel per unit.
                    for _ in 0..line.qty {
                        builder.push_oversized_unit(line, unit_g);
                    }
                } else {
                    tracing::warn!(
                        "Line {} cannot be packed: unit {:.2} kg exceeds box cap {:.2} kg",
                        line.product_id,
                        unit_g as f64 / 1000.0,
                        self.constraints.max_weight_kg
                    );
                    outcome.unpackable.push(UnpackableLine {
                        product_id: line.product_id.clone(),
                        unit_weight_g: line.unit_weight_g,
                        max_weight_kg: self.constraints.max_weight_kg,
                    });
                }
            } else if total <= satchel_g {
                builder.push_satchel(line, total);
            } else if total > max_g {
                builder.push_split_line(line, unit_g, max_g);
            } else {
                builder.push_into_box(line, total, max_g);
            }
        }

        outcome.parcels = builder.finish();
        outcome
    }
}

fn kg_to_g(kg: f64) -> u64 {
    (kg * 1000.0).round() as u64
}

fn effective_unit_g(line: &PackLine) -> u64 {
    (line.unit_weight_g as u64).max(EPSILON_UNIT_G)
}

fn line_total_g(line: &PackLine) -> u64 {
    line.qty as u64 * effective_unit_g(line)
}

/// Accumulates satchels and the current open box, assigning parcel ids in
/// creation order so output is stable for identical input.
struct ParcelBuilder<'a> {
    constraints: &'a PackConstraints,
    parcels: Vec<Parcel>,
    open_contents: Vec<(ParcelLine, Option<f64>)>,
    open_weight_g: u64,
}

impl<'a> ParcelBuilder<'a> {
    fn new(constraints: &'a PackConstraints) -> Self {
        Self {
            constraints,
            parcels: Vec::new(),
            open_contents: Vec::new(),
            open_weight_g: 0,
        }
    }

    fn push_satchel(&mut self, line: &PackLine, total_g: u64) {
        let contents = vec![(
            ParcelLine {
                product_id: line.product_id.clone(),
                qty: line.qty,
            },
            line_volume_cm3(line, line.qty),
        )];
        self.emit(
            ParcelKind::Satchel,
            self.constraints.satchel_limit_kg,
            contents,
            total_g,
            false,
        );
    }

    fn push_oversized_unit(&mut self, line: &PackLine, unit_g: u64) {
        let contents = vec![(
            ParcelLine {
                product_id: line.product_id.clone(),
                qty: 1,
            },
            line_volume_cm3(line, 1),
        )];
        self.emit(
            ParcelKind::Box,
            self.constraints.max_weight_kg,
            contents,
            unit_g,
            true,
        );
    }

    fn push_into_box(&mut self, line: &PackLine, total_g: u64, max_g: u64) {
        if self.open_weight_g + total_g > max_g {
            self.close_open_box();
        }
        self.open_contents.push((
            ParcelLine {
                product_id: line.product_id.clone(),
                qty: line.qty,
            },
            line_volume_cm3(line, line.qty),
        ));
        self.open_weight_g += total_g;
    }

    /// Splits a line heavier than one box across `ceil(qty / per_box_cap)`
    /// boxes, spreading quantity as evenly as possible. The per-box unit
    /// capacity keeps every split box under the cap, and the distribution
    /// conserves quantity exactly.
    fn push_split_line(&mut self, line: &PackLine, unit_g: u64, max_g: u64) {
        self.close_open_box();

        let per_box_cap = (max_g / unit_g).max(1) as u32;
        let boxes_needed = line.qty.div_ceil(per_box_cap);
        let base = line.qty / boxes_needed;
        let remainder = line.qty % boxes_needed;

        for i in 0..boxes_needed {
            let qty = if i < remainder { base + 1 } else { base };
            let contents = vec![(
                ParcelLine {
                    product_id: line.product_id.clone(),
                    qty,
                },
                line_volume_cm3(line, qty),
            )];
            self.emit(
                ParcelKind::Box,
                self.constraints.max_weight_kg,
                contents,
                qty as u64 * unit_g,
                false,
            );
        }
    }

    fn close_open_box(&mut self) {
        if self.open_contents.is_empty() {
            return;
        }
        let contents = std::mem::take(&mut self.open_contents);
        let weight_g = std::mem::take(&mut self.open_weight_g);
        self.emit(
            ParcelKind::Box,
            self.constraints.max_weight_kg,
            contents,
            weight_g,
            false,
        );
    }

    fn emit(
        &mut self,
        kind: ParcelKind,
        max_weight_kg: f64,
        contents: Vec<(ParcelLine, Option<f64>)>,
        weight_g: u64,
        over_limit: bool,
    ) {
        let volume_m3 = contents
            .iter()
            .map(|(_, v)| *v)
            .collect::<Option<Vec<f64>>>()
            .map(|vols| vols.iter().sum::<f64>() / 1_000_000.0);

        let parcel_id = self.parcels.len() as u32 + 1;
        self.parcels.push(Parcel {
            parcel_id,
            kind,
            max_weight_kg,
            max_volume_m3: None,
            contents: contents.into_iter().map(|(line, _)| line).collect(),
            weight_kg: weight_g as f64 / 1000.0,
            volume_m3,
            over_limit,
        });
    }

    fn finish(mut self) -> Vec<Parcel> {
        self.close_open_box();
        self.parcels
    }
}

fn line_volume_cm3(line: &PackLine, qty: u32) -> Option<f64> {
    line.unit_volume_cm3.map(|v| v * qty as f64)
}

/// Builds pack lines for a set of items by running them through the weight
/// resolver; the glue between the session's items and the packer.
pub fn lines_from_quantities<W: WeightSource>(
    resolver: &mut WeightResolver<W>,
    quantities: &[(ProductId, u32)],
) -> Vec<PackLine> {
    quantities
        .iter()
        .map(|(product_id, qty)| {
            let resolved = resolver.resolve_one(product_id);
            PackLine {
                product_id: product_id.clone(),
                qty: *qty,
                unit_weight_g: resolved.weight_g,
                unit_volume_cm3: resolver.unit_volume_cm3(product_id),
            }
        })
        .collect()
}
