use crate::container::{AUXILIARY_GROUP, ArchiveWriter, Attributes};
use crate::error::WarnCode;
use crate::station::dates::NeighborDates;
use crate::station::sanitize::storage_key;
use crate::station::warn::{self, WarnEvent};
use anyhow::Result;

pub const CONNECTIONS_GROUP: &str = "connections";

#[derive(Debug, Clone, Default)]
pub struct AuxOutcome {
    pub written: Vec<String>,
    pub collisions: Vec<String>,
}

pub fn nodes_path(station: &str) -> String {
    format!(
        "{AUXILIARY_GROUP}/{CONNECTIONS_GROUP}/{}_nodes",
        storage_key(station)
    )
}

pub fn dates_path(station: &str, neighbor: &str) -> String {
    format!(
        "{AUXILIARY_GROUP}/{CONNECTIONS_GROUP}/{}_{}_dates",
        storage_key(station),
        storage_key(neighbor)
    )
}

fn described(text: String) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("description".to_string(), text);
    attrs
}

/// Writes the node-list record, then one raw date-list record per neighbor.
/// A key already present in the archive is kept and the new record dropped.
pub fn write_connections(
    writer: &mut ArchiveWriter,
    station: &str,
    connected: &[NeighborDates],
) -> Result<AuxOutcome> {
    let mut out = AuxOutcome::default();

    let neighbors: Vec<String> = connected.iter().map(|c| c.neighbor.clone()).collect();
    let path = nodes_path(station);
    write_record(
        writer,
        station,
        &path,
        described(format!("Stations connected to {station}")),
        &neighbors,
        &mut out,
    )?;

    for entry in connected {
        let path = dates_path(station, &entry.neighbor);
        write_record(
            writer,
            station,
            &path,
            described(format!(
                "Dates shared by {station} and {}",
                entry.neighbor
            )),
            &entry.dates,
            &mut out,
        )?;
    }

    Ok(out)
}

fn write_record(
    writer: &mut ArchiveWriter,
    station: &str,
    path: &str,
    attrs: Attributes,
    values: &[String],
    out: &mut AuxOutcome,
) -> Result<()> {
    if writer.contains(path) {
        warn::emit(WarnEvent {
            code: WarnCode::AuxKeyCollision,
            stage: "auxiliary",
            station,
            subject: path,
            reason: "storage-key-already-written",
            err: "kept first record",
        });
        out.collisions.push(path.to_string());
        return Ok(());
    }
    writer.add_fixed_strings(path, &attrs, values)?;
    out.written.push(path.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ArchiveReader;
    use tempfile::tempdir;

    fn entry(neighbor: &str, dates: &[&str]) -> NeighborDates {
        NeighborDates {
            neighbor: neighbor.to_string(),
            dates: dates.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn paths_use_storage_keys() {
        assert_eq!(nodes_path("XX.STA1"), "AuxiliaryData/connections/XX_STA1_nodes");
        assert_eq!(
            dates_path("X", "NET/Y.00"),
            "AuxiliaryData/connections/X_NET_Y_00_dates"
        );
    }

    #[test]
    fn writes_node_list_and_one_record_per_neighbor() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("aux.spk");
        let mut writer = ArchiveWriter::create(&target)?;
        let connected = vec![entry("A", &["2021_01_01"]), entry("B", &[])];
        let out = write_connections(&mut writer, "S", &connected)?;
        writer.finish()?;

        assert_eq!(out.written.len(), 3);
        assert!(out.collisions.is_empty());

        let reader = ArchiveReader::open(&target)?;
        let nodes = reader.read_fixed_strings("AuxiliaryData/connections/S_nodes")?;
        assert_eq!(nodes.values, vec!["A", "B"]);
        assert_eq!(
            nodes.attributes.get("description").map(String::as_str),
            Some("Stations connected to S")
        );
        let b = reader.read_fixed_strings("AuxiliaryData/connections/S_B_dates")?;
        assert!(b.values.is_empty());
        Ok(())
    }

    #[test]
    fn colliding_keys_keep_first_record() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("aux.spk");
        let mut writer = ArchiveWriter::create(&target)?;
        let connected = vec![entry("A.B", &["2021_01_01"]), entry("A_B", &["2022_01_01"])];
        let out = write_connections(&mut writer, "S", &connected)?;
        writer.finish()?;

        assert_eq!(out.collisions, vec!["AuxiliaryData/connections/S_A_B_dates"]);
        let reader = ArchiveReader::open(&target)?;
        let kept = reader.read_fixed_strings("AuxiliaryData/connections/S_A_B_dates")?;
        assert_eq!(kept.values, vec!["2021_01_01"]);
        Ok(())
    }
}
