use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin("keymatch")?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

/// 第 n 个合成描述符：只有一个位置非零，相互之间距离很远，
/// 同一下标的描述符在不同图片中距离为 0
fn spike(n: usize) -> Vec<u8> {
    let mut v = vec![0u8; 128];
    v[n % 128] = 200;
    v
}

/// 按 Lowe 格式写出一个 key 文件
fn write_key_file(path: &Path, descriptors: &[Vec<u8>]) -> Result<()> {
    let mut text = String::new();
    writeln!(text, "{} 128", descriptors.len())?;
    for (i, d) in descriptors.iter().enumerate() {
        writeln!(text, "{}.0 {}.0 1.0 0.0", i, i)?;
        for chunk in d.chunks(20) {
            let line = chunk.iter().map(u8::to_string).collect::<Vec<_>>().join(" ");
            writeln!(text, " {}", line)?;
        }
    }
    fs::write(path, text)?;
    Ok(())
}

/// 生成数据集：每张图片包含 counts[i] 个 spike 描述符，返回列表文件路径
fn make_dataset(dir: &Path, counts: &[usize]) -> Result<PathBuf> {
    let mut list = String::new();
    for (i, &count) in counts.iter().enumerate() {
        let path = dir.join(format!("img{}.key", i));
        let descriptors = (0..count).map(spike).collect::<Vec<_>>();
        write_key_file(&path, &descriptors)?;
        writeln!(list, "{}", path.display())?;
    }
    let list_path = dir.join("list.txt");
    fs::write(&list_path, list)?;
    Ok(list_path)
}

/// 把输出解析成（源，目标，匹配列表）的记录集合
fn parse_records(text: &str) -> Vec<(usize, usize, Vec<(u32, u32)>)> {
    let mut lines = text.lines();
    let mut records = vec![];
    while let Some(pair) = lines.next() {
        let (src, dst) = pair.split_once(' ').unwrap();
        let count = lines.next().unwrap().parse::<usize>().unwrap();
        let matches = (0..count)
            .map(|_| {
                let (a, b) = lines.next().unwrap().split_once(' ').unwrap();
                (a.parse().unwrap(), b.parse().unwrap())
            })
            .collect();
        records.push((src.parse().unwrap(), dst.parse().unwrap(), matches));
    }
    records.sort();
    records
}

#[test]
fn match_identical_images() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let list = make_dataset(dir.path(), &[20, 20, 20])?;
    let output = dir.path().join("matches.txt");

    cargo_run!("match", &list, &output).success();

    let records = parse_records(&fs::read_to_string(&output)?);
    let pairs = records.iter().map(|r| (r.0, r.1)).collect::<Vec<_>>();
    assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);

    for (src, dst, matches) in &records {
        assert!(src < dst);
        assert_eq!(matches.len(), 20);
        // 相同的图片，匹配是恒等映射
        for (i, m) in matches.iter().enumerate() {
            assert_eq!(*m, (i as u32, i as u32));
        }
    }
    Ok(())
}

#[test]
fn unreadable_key_file_is_skipped() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let list = make_dataset(dir.path(), &[20, 20])?;
    // 列表开头插入一个不存在的 key 文件，它对应的图片应该被所有图片对跳过
    let text = fs::read_to_string(&list)?;
    fs::write(&list, format!("{}\n{}", dir.path().join("missing.key").display(), text))?;
    let output = dir.path().join("matches.txt");

    cargo_run!("match", &list, &output).success();

    let records = parse_records(&fs::read_to_string(&output)?);
    let pairs = records.iter().map(|r| (r.0, r.1)).collect::<Vec<_>>();
    assert_eq!(pairs, vec![(1, 2)]);
    Ok(())
}

#[rstest]
#[case(-1, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)])]
#[case(0, vec![])]
#[case(1, vec![(0, 1), (1, 2), (2, 3)])]
#[case(2, vec![(0, 1), (0, 2), (1, 2), (1, 3), (2, 3)])]
fn window_radius_limits_pairs(
    #[case] radius: i32,
    #[case] expected: Vec<(usize, usize)>,
) -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let list = make_dataset(dir.path(), &[20, 20, 20, 20])?;
    let output = dir.path().join("matches.txt");

    cargo_run!("match", &list, &output, format!("--window-radius={}", radius)).success();

    let records = parse_records(&fs::read_to_string(&output)?);
    let pairs = records.iter().map(|r| (r.0, r.1)).collect::<Vec<_>>();
    assert_eq!(pairs, expected);
    Ok(())
}

#[rstest]
#[case(15, 0)]
#[case(16, 1)]
fn min_match_threshold(#[case] source_count: usize, #[case] expected_records: usize) -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let list = make_dataset(dir.path(), &[source_count, 20])?;
    let output = dir.path().join("matches.txt");

    cargo_run!("match", &list, &output).success();

    let records = parse_records(&fs::read_to_string(&output)?);
    assert_eq!(records.len(), expected_records);
    Ok(())
}

#[test]
fn worker_count_does_not_change_records() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let counts = (0..6).map(|n| 16 + n).collect::<Vec<_>>();
    let list = make_dataset(dir.path(), &counts)?;
    let out1 = dir.path().join("matches-1.txt");
    let out8 = dir.path().join("matches-8.txt");

    cargo_run!("match", &list, &out1, "-j", "1").success();
    cargo_run!("match", &list, &out8, "-j", "8").success();

    let single = parse_records(&fs::read_to_string(&out1)?);
    let parallel = parse_records(&fs::read_to_string(&out8)?);
    assert!(!single.is_empty());
    assert_eq!(single, parallel);
    Ok(())
}

#[test]
fn single_worker_is_deterministic() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let list = make_dataset(dir.path(), &[20, 20, 20])?;
    let out1 = dir.path().join("run1.txt");
    let out2 = dir.path().join("run2.txt");

    cargo_run!("match", &list, &out1, "-j", "1").success();
    cargo_run!("match", &list, &out2, "-j", "1").success();

    assert_eq!(fs::read_to_string(&out1)?, fs::read_to_string(&out2)?);
    Ok(())
}

#[test]
fn missing_list_is_fatal() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let output = dir.path().join("matches.txt");

    cargo_run!("match", dir.path().join("missing.txt"), &output)
        .failure()
        .stderr(predicate::str::contains("[ERR]"));
    Ok(())
}

#[test]
fn empty_list_is_fatal() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let list = dir.path().join("list.txt");
    fs::write(&list, "\n  \n")?;

    cargo_run!("match", &list, dir.path().join("matches.txt"))
        .failure()
        .stderr(predicate::str::contains("[ERR]"));
    Ok(())
}

#[test]
fn unwritable_output_is_fatal() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let list = make_dataset(dir.path(), &[20, 20])?;

    cargo_run!("match", &list, dir.path().join("no-such-dir").join("matches.txt"))
        .failure()
        .stderr(predicate::str::contains("[ERR]"));
    Ok(())
}

#[test]
fn show_prints_descriptor_counts() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let list = make_dataset(dir.path(), &[5, 0, 12])?;

    cargo_run!("show", &list)
        .success()
        .stdout(predicate::str::contains("0\t5"))
        .stdout(predicate::str::contains("1\t0"))
        .stdout(predicate::str::contains("2\t12"));
    Ok(())
}
