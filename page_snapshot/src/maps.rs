use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::growth::GrowthPolicy;
use crate::AddressRange;

#[derive(Debug, Default)]
pub struct RegionList {
    pub ranges: Vec<AddressRange>,
    pub rejected: usize,
}

/// Parses one `/proc/<pid>/maps` line:
/// `start-end perms offset major:minor inode [path]`.
/// Only the address pair is kept, but every other field must be well formed.
pub fn parse_maps_line(line: &str) -> Option<AddressRange> {
    let (begin, end, perms, _offset, _major, _minor, _inode) = scan_fmt!(
        line,
        "{x}-{x} {} {x} {x}:{x} {d}",
        [hex u64],
        [hex u64],
        String,
        [hex u64],
        [hex u32],
        [hex u32],
        u64
    )
    .ok()?;
    // any four characters, the letters themselves are not checked
    if perms.chars().count() != 4 {
        return None;
    }
    Some(AddressRange::new(begin, end))
}

/// Reads every region of a maps listing. Malformed lines are logged and
/// skipped; only I/O and allocation failures abort.
pub fn parse_regions<R: BufRead>(reader: R, growth: &GrowthPolicy) -> Result<RegionList> {
    parse_regions_with(reader, growth, |line| warn!("unexpected line: {}", line))
}

pub fn parse_regions_with<R, F>(
    mut reader: R,
    growth: &GrowthPolicy,
    mut on_rejected: F,
) -> Result<RegionList>
where
    R: BufRead,
    F: FnMut(&str),
{
    let mut regions = RegionList::default();
    let mut buffer: Vec<u8> = Vec::new();
    loop {
        buffer.clear();
        let nread = reader
            .read_until(b'\n', &mut buffer)
            .map_err(|source| Error::Read {
                resource: "maps",
                source,
            })?;
        if nread == 0 {
            break;
        }
        // paths are not guaranteed to be UTF-8
        let line = String::from_utf8_lossy(&buffer);
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        match parse_maps_line(line) {
            Some(range) => growth.push(&mut regions.ranges, range)?,
            None => {
                on_rejected(line);
                regions.rejected += 1;
            }
        }
    }
    Ok(regions)
}

pub fn get_regions(path: &Path, growth: &GrowthPolicy) -> Result<RegionList> {
    let start_time = Utc::now();
    let file = File::open(path).map_err(|source| Error::Open {
        resource: "maps",
        path: path.to_path_buf(),
        source,
    })?;
    let regions = parse_regions(BufReader::new(file), growth)?;
    debug!(
        "Parsed {} regions ({} rejected) in {} ms",
        regions.ranges.len(),
        regions.rejected,
        (Utc::now() - start_time).num_milliseconds()
    );
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_file_backed_line() {
        let range = parse_maps_line("00400000-00401000 r-xp 00000000 08:01 123456 /bin/true");
        assert_eq!(range, Some(AddressRange::new(0x400000, 0x401000)));
    }

    #[test]
    fn parses_anonymous_and_special_lines() {
        assert_eq!(
            parse_maps_line("7ffd1c5a6000-7ffd1c5c7000 rw-p 00000000 00:00 0                          [stack]"),
            Some(AddressRange::new(0x7ffd1c5a6000, 0x7ffd1c5c7000))
        );
        assert_eq!(
            parse_maps_line("7f0a2c000000-7f0a2c021000 rw-s 00000000 00:00 0 "),
            Some(AddressRange::new(0x7f0a2c000000, 0x7f0a2c021000))
        );
        assert_eq!(
            parse_maps_line("ffffffffff600000-ffffffffff601000 --xp 00000000 00:00 0 [vsyscall]"),
            Some(AddressRange::new(0xffffffffff600000, 0xffffffffff601000))
        );
    }

    #[test]
    fn permission_letters_are_not_checked() {
        assert_eq!(
            parse_maps_line("00400000-00401000 rwxS 00000000 08:01 123"),
            Some(AddressRange::new(0x400000, 0x401000))
        );
        assert_eq!(
            parse_maps_line("00400000-00401000 abcd 00000000 08:01 123"),
            Some(AddressRange::new(0x400000, 0x401000))
        );
    }

    #[test]
    fn rejects_short_or_garbled_lines() {
        for line in [
            "",
            "00400000-00401000",
            "00400000-00401000 r-xp 00000000 08:01",
            "00400000-00401000 r-xp 00000000 08-01 123",
            "00400000-00401000 rxp 00000000 08:01 123",
            "00400000-00401000 r-xpp 00000000 08:01 123",
            "zz400000-00401000 r-xp 00000000 08:01 123",
            "00400000-00401000 r-xp 00000000 08:01 inode",
        ]
        .iter()
        {
            assert_eq!(parse_maps_line(line), None, "{:?}", line);
        }
    }

    #[test]
    fn keeps_order_and_counts_rejects() {
        let listing = "\
00400000-00401000 r-xp 00000000 08:01 123456 /bin/true
garbage
00600000-00601000 rw-p 00000000 08:01 123456 /bin/true
00500000-00501000 r--p 00000000 08:01 123456 /bin/true
00700000-00701000 r--p 00000000 08:01
";
        let regions = parse_regions(listing.as_bytes(), &GrowthPolicy::default()).unwrap();
        assert_eq!(
            regions.ranges,
            vec![
                AddressRange::new(0x400000, 0x401000),
                AddressRange::new(0x600000, 0x601000),
                AddressRange::new(0x500000, 0x501000),
            ]
        );
        assert_eq!(regions.rejected, 2);
    }

    #[test]
    fn one_diagnostic_per_bad_line() {
        let listing = "\
garbage
00400000-00401000 r-xp 00000000 08:01 123456 /bin/true
00700000-00701000 r--p 00000000 08:01
garbage
";
        let mut diagnostics = Vec::new();
        let regions = parse_regions_with(listing.as_bytes(), &GrowthPolicy::default(), |line| {
            diagnostics.push(line.to_string())
        })
        .unwrap();
        assert_eq!(regions.ranges, vec![AddressRange::new(0x400000, 0x401000)]);
        assert_eq!(
            diagnostics,
            vec![
                "garbage".to_string(),
                "00700000-00701000 r--p 00000000 08:01".to_string(),
                "garbage".to_string(),
            ]
        );
        assert_eq!(regions.rejected, diagnostics.len());
    }

    #[test]
    fn survives_growth() {
        let policy = GrowthPolicy {
            initial_capacity: 1,
            factor: 1.5,
        };
        let mut listing = String::new();
        for i in 0..50u64 {
            let begin = 0x10000 + i * 0x2000;
            listing.push_str(&format!(
                "{:08x}-{:08x} rw-p 00000000 00:00 0\n",
                begin,
                begin + 0x1000
            ));
        }
        let regions = parse_regions(listing.as_bytes(), &policy).unwrap();
        assert_eq!(regions.ranges.len(), 50);
        for (i, range) in regions.ranges.iter().enumerate() {
            assert_eq!(range.begin, 0x10000 + i as u64 * 0x2000);
        }
    }

    #[test]
    fn non_utf8_paths_are_fine() {
        let mut listing = b"00400000-00401000 r-xp 00000000 08:01 1 /tmp/\xff\xfe\n".to_vec();
        listing.extend_from_slice(b"00500000-00501000 r-xp 00000000 08:01 1\n");
        let regions = parse_regions(&listing[..], &GrowthPolicy::default()).unwrap();
        assert_eq!(regions.ranges.len(), 2);
        assert_eq!(regions.rejected, 0);
    }
}
