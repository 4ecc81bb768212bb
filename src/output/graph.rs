//! The module responsible for writing commodity network graphs to file.
use crate::network::manager::CommodityNetworkManager;
use crate::network::render::{build_network_graph, to_dot};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// Saves network graphs to file.
///
/// Two DOT files are written for every screened region and every period analysed by `manager`:
/// `network_{region}_{period}.dot` shows the network before orphans were removed, with the
/// orphans highlighted, and `network_{region}_{period}_filtered.dot` shows what survived.
///
/// # Returns
///
/// The paths of the files written.
pub fn save_network_graphs(
    manager: &CommodityNetworkManager,
    output_path: &Path,
) -> Result<Vec<PathBuf>> {
    let data = manager.original_data();
    let mut paths = Vec::new();
    for region_id in data.screened_regions() {
        for &period in manager.periods() {
            let report = manager.orphans().get(&(region_id.clone(), period));
            let graph = build_network_graph(data, report, &region_id, period);

            let path = output_path.join(format!("network_{region_id}_{period}.dot"));
            write_dot(&path, &to_dot(&graph))?;
            paths.push(path);

            if let Some(filtered) = manager.filtered_data() {
                let graph = build_network_graph(filtered, None, &region_id, period);
                let path = output_path.join(format!("network_{region_id}_{period}_filtered.dot"));
                write_dot(&path, &to_dot(&graph))?;
                paths.push(path);
            }
        }
    }
    Ok(paths)
}

fn write_dot(path: &Path, dot: &str) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
    write!(file, "{dot}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::network_data_for_periods;
    use crate::network::manager::NetworkOptions;
    use tempfile::tempdir;

    #[test]
    fn files_per_region_and_period() {
        let data = network_data_for_periods(
            &[("s1", "t1", "p1"), ("p1", "t2", "d1"), ("p2", "t3", "d1")],
            &["d1"],
            &[2020, 2030],
        );
        let mut manager =
            CommodityNetworkManager::new(&[2020, 2030], data, NetworkOptions::default());
        manager.analyze_network().unwrap();

        let dir = tempdir().unwrap();
        let paths = save_network_graphs(&manager, dir.path()).unwrap();
        assert_eq!(
            paths,
            [
                dir.path().join("network_R1_2020.dot"),
                dir.path().join("network_R1_2020_filtered.dot"),
                dir.path().join("network_R1_2030.dot"),
                dir.path().join("network_R1_2030_filtered.dot"),
            ]
        );
        let contents = std::fs::read_to_string(&paths[0]).unwrap();
        assert!(contents.starts_with("digraph"));
        assert!(contents.contains("t3"));
        let contents = std::fs::read_to_string(&paths[1]).unwrap();
        assert!(!contents.contains("t3"));
    }
}
