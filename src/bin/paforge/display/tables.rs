use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use pa_forge::io::FieldStore;
use pa_forge::{
    ComposedVolume, DeformationConfig, MoleculeLibrary, SegmentationClass, SimulationSettings,
    TissueLibrary, TissueSpec, VolumeFraction,
};

use crate::util::text::{join_with_unit, truncate};

const INDENT: &str = "      ";

const BOX_INNER_WIDTH: usize = 62;
const SAFE_TABLE_WIDTH: usize = BOX_INNER_WIDTH - INDENT.len();

const MAX_ROWS: usize = 15;

pub fn print_settings_summary(settings: &SimulationSettings) {
    let grid = &settings.grid;
    let [nx, ny, nz] = grid.dims;
    let [ex, ey, ez] = grid.extent_mm;

    let deformation = match &settings.deformation {
        None => "none".to_string(),
        Some(DeformationConfig::Generated {
            max_elevation_mm, ..
        }) => format!("generated, ≤ {max_elevation_mm} mm"),
        Some(DeformationConfig::Explicit(_)) => "explicit".to_string(),
    };

    let rows = vec![
        ("Name", settings.name.clone()),
        ("Seed", settings.random_seed.to_string()),
        ("Spacing (mm)", format!("{}", grid.spacing_mm)),
        ("Extent (mm)", format!("{ex} × {ey} × {ez}")),
        ("Voxels", format!("{nx} × {ny} × {nz}")),
        ("Wavelengths", join_with_unit(&settings.wavelengths, "nm")),
        ("Structures", settings.structures.len().to_string()),
        ("Deformation", deformation),
    ];

    print_kv_table(&mut io::stderr().lock(), "Simulation Settings", &rows);
}

/// Share of voxels painted with each segmentation class.
pub fn print_segmentation(volume: &ComposedVolume) {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for &code in volume.segmentation() {
        *counts.entry(code).or_insert(0) += 1;
    }

    let total = volume.grid().voxel_count();
    let mut rows: Vec<_> = counts
        .into_iter()
        .map(|(code, count)| {
            let name = SegmentationClass::from_code(code)
                .map(|class| class.to_string())
                .unwrap_or_else(|| format!("class {code}"));
            (name, count.to_string(), percent(count as f64, total as f64))
        })
        .collect();
    rows.sort_by(|a, b| b.2.total_cmp(&a.2));

    print_distribution_table(
        &mut io::stderr().lock(),
        "Segmentation",
        ("Class", "Voxels"),
        &rows,
    );
}

/// Mean volume fraction of each molecule over the whole grid.
pub fn print_molecule_fractions(volume: &ComposedVolume) {
    let total = volume.grid().voxel_count() as f64;
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for (molecule, fraction) in volume.constituents() {
        *sums.entry(molecule.name.as_str()).or_insert(0.0) += fraction.sum();
    }

    let mut rows: Vec<_> = sums
        .into_iter()
        .map(|(name, sum)| {
            let share = percent(sum, total);
            (name.to_string(), format!("{:.4}", sum / total), share)
        })
        .collect();
    rows.sort_by(|a, b| b.2.total_cmp(&a.2));

    print_distribution_table(
        &mut io::stderr().lock(),
        "Molecular Composition",
        ("Molecule", "Mean"),
        &rows,
    );
}

/// Value range of every volume in the store.
pub fn print_field_summary(store: &FieldStore) {
    let rows: Vec<(String, String)> = store
        .iter()
        .map(|(key, data)| {
            let (lo, hi) = data
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            let range = if data.is_empty() {
                "empty".to_string()
            } else {
                format!("{lo:.3e} … {hi:.3e}")
            };
            (key.to_string(), range)
        })
        .collect();
    let rows: Vec<(&str, String)> = rows.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

    print_kv_table(&mut io::stderr().lock(), "Field Store", &rows);
}

pub fn print_batch_summary(outputs: &[(u64, PathBuf)]) {
    let rows: Vec<(String, String)> = outputs
        .iter()
        .map(|(seed, path)| (format!("seed {seed}"), path.display().to_string()))
        .collect();
    let rows: Vec<(&str, String)> = rows.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

    print_kv_table(&mut io::stderr().lock(), "Batch Outputs", &rows);
}

/// Optical and acoustic descriptors of every molecule at `wavelength_nm`.
pub fn print_molecule_library(out: &mut impl Write, molecules: &MoleculeLibrary, wavelength_nm: u32) {
    let wavelength = f64::from(wavelength_nm);

    let _ = writeln!(out, "{INDENT}┌─ Molecules at {wavelength_nm} nm ─┐");
    let _ = writeln!(out, "{INDENT}┌──────────────────────┬──────────┬──────────┬──────┬────────┐");
    let _ = writeln!(out, "{INDENT}│ Molecule             │ μa (/cm) │ μs (/cm) │    g │ c (m/s)│");
    let _ = writeln!(out, "{INDENT}├──────────────────────┼──────────┼──────────┼──────┼────────┤");

    for name in molecules.names() {
        let Ok(molecule) = molecules.molecule(name) else {
            continue;
        };
        let mua = molecule
            .absorption_per_cm(wavelength)
            .map(|v| format!("{v:.3e}"))
            .unwrap_or_else(|_| "n/a".to_string());
        let _ = writeln!(
            out,
            "{INDENT}│ {:<20} │ {:>8} │ {:>8.2} │ {:>4.2} │ {:>6.0} │",
            truncate(name, 20),
            mua,
            molecule.scattering_per_cm(wavelength),
            molecule.anisotropy,
            molecule.acoustic.speed_of_sound,
        );
    }

    let _ = writeln!(out, "{INDENT}└──────────────────────┴──────────┴──────────┴──────┴────────┘");
}

/// Tissue presets with their default parameters.
pub fn print_tissue_presets(out: &mut impl Write, tissues: &TissueLibrary<'_>, wavelength_nm: u32) {
    let wavelength = f64::from(wavelength_nm);

    let _ = writeln!(out, "{INDENT}┌─ Tissue Presets at {wavelength_nm} nm ─┐");
    let _ = writeln!(out, "{INDENT}┌──────────────────┬────────────────┬─────┬────────────┐");
    let _ = writeln!(out, "{INDENT}│ Preset           │ Segmentation   │ Mol │ μa (/cm)   │");
    let _ = writeln!(out, "{INDENT}├──────────────────┼────────────────┼─────┼────────────┤");

    for spec in TissueSpec::defaults() {
        let Ok(composition) = tissues.resolve(&spec) else {
            continue;
        };
        let mua = composition
            .constituents()
            .iter()
            .try_fold(0.0, |acc, c| {
                let fraction = match &c.fraction {
                    VolumeFraction::Uniform(f) => *f,
                    VolumeFraction::Field(_) => return Err(()),
                };
                let value = c.molecule.absorption_per_cm(wavelength).map_err(|_| ())?;
                Ok(acc + fraction * value)
            })
            .map(|v| format!("{v:.3e}"))
            .unwrap_or_else(|()| "n/a".to_string());
        let _ = writeln!(
            out,
            "{INDENT}│ {:<16} │ {:<14} │ {:>3} │ {:>10} │",
            spec.name(),
            composition.segmentation().as_str(),
            composition.constituents().len(),
            mua,
        );
    }

    let _ = writeln!(out, "{INDENT}└──────────────────┴────────────────┴─────┴────────────┘");
}

fn print_distribution_table(
    out: &mut impl Write,
    title: &str,
    headers: (&str, &str),
    data: &[(String, String, f64)],
) {
    let name_w = 14usize;
    let value_w = 8usize;
    let sep_overhead = 6;
    let dist_w = SAFE_TABLE_WIDTH.saturating_sub(name_w + value_w + sep_overhead);
    let max_bar_width = dist_w.saturating_sub(8).min(20);
    let rule = |left: &str, mid: &str, right: &str| {
        format!(
            "{INDENT}{left}{}{mid}{}{mid}{}{right}",
            "─".repeat(name_w + 2),
            "─".repeat(value_w + 2),
            "─".repeat(dist_w + 2)
        )
    };

    let _ = writeln!(out, "{INDENT}┌─ {} ─┐", truncate(title, SAFE_TABLE_WIDTH - 6));
    let _ = writeln!(out, "{}", rule("┌", "┬", "┐"));
    let _ = writeln!(
        out,
        "{INDENT}│ {:<name_w$} │ {:>value_w$} │ {:<dist_w$} │",
        headers.0, headers.1, "Share"
    );
    let _ = writeln!(out, "{}", rule("├", "┼", "┤"));

    for (name, value, pct) in data.iter().take(MAX_ROWS) {
        let dist_cell = format!("{}  {:>5.1}%", make_bar(*pct, max_bar_width), pct);
        let _ = writeln!(
            out,
            "{INDENT}│ {:<name_w$} │ {:>value_w$} │ {:<dist_w$} │",
            truncate(name, name_w),
            truncate(value, value_w),
            dist_cell
        );
    }

    if data.len() > MAX_ROWS {
        let _ = writeln!(
            out,
            "{INDENT}│ {:<name_w$} │ {:>value_w$} │ {:<dist_w$} │",
            "...",
            "...",
            format!("({} more)", data.len() - MAX_ROWS)
        );
    }

    let _ = writeln!(out, "{}", rule("└", "┴", "┘"));
}

fn print_kv_table(out: &mut impl Write, title: &str, rows: &[(&str, String)]) {
    let key_w = 22usize;
    let sep_overhead = 6;
    let val_w = SAFE_TABLE_WIDTH.saturating_sub(key_w + sep_overhead);
    let rule = |left: &str, mid: &str, right: &str| {
        format!(
            "{INDENT}{left}{}{mid}{}{right}",
            "─".repeat(key_w + 2),
            "─".repeat(val_w + 2)
        )
    };

    let _ = writeln!(out, "{INDENT}┌─ {} ─┐", truncate(title, SAFE_TABLE_WIDTH - 6));
    let _ = writeln!(out, "{}", rule("┌", "┬", "┐"));
    for (key, val) in rows {
        let _ = writeln!(
            out,
            "{INDENT}│ {:<key_w$} │ {:>val_w$} │",
            truncate(key, key_w),
            truncate(val, val_w)
        );
    }
    let _ = writeln!(out, "{}", rule("└", "┴", "┘"));
}

fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

fn make_bar(pct: f64, max_width: usize) -> String {
    let filled = ((pct / 100.0) * max_width as f64).round() as usize;
    let filled = filled.min(max_width);
    format!("{}{}", "█".repeat(filled), "░".repeat(max_width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_is_clamped_to_width() {
        assert_eq!(make_bar(50.0, 4), "██░░");
        assert_eq!(make_bar(130.0, 4), "████");
        assert_eq!(make_bar(0.0, 3), "░░░");
    }

    #[test]
    fn percent_of_empty_total_is_zero() {
        assert_eq!(percent(3.0, 0.0), 0.0);
        assert_eq!(percent(1.0, 4.0), 25.0);
    }

    #[test]
    fn kv_table_rows_share_one_width() {
        let mut out = Vec::new();
        print_kv_table(
            &mut out,
            "Settings",
            &[("Seed", "7".to_string()), ("Wavelengths", "700, 800 nm".to_string())],
        );
        let text = String::from_utf8(out).unwrap();
        let widths: Vec<usize> = text
            .lines()
            .skip(1)
            .map(|line| line.chars().count())
            .collect();
        assert_eq!(widths.len(), 4);
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn library_listing_names_every_molecule() {
        let mut out = Vec::new();
        let molecules = MoleculeLibrary::builtin();
        print_molecule_library(&mut out, molecules, 800);
        let text = String::from_utf8(out).unwrap();
        for name in molecules.names() {
            assert!(text.contains(&truncate(name, 20)), "{name} missing");
        }
    }
}
