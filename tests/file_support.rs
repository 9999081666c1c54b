//! Corpus indexing across file formats: PDF and DOCX extraction, unreadable
//! files skipped, size limit, categories from directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lexassist_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("lexassist");
    path
}

/// Minimal PDF whose single page reads "payment of wages".
/// Offsets in the xref table are computed as the body is written.
fn minimal_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 44 >> stream\nBT /F1 12 Tf 100 700 Td (payment of wages) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn setup(max_file_bytes: u64) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    let corpus = root.join("corpus");
    fs::create_dir_all(corpus.join("labour")).unwrap();
    fs::create_dir_all(corpus.join("property")).unwrap();

    fs::write(corpus.join("labour/wages_1936.pdf"), minimal_pdf()).unwrap();
    fs::write(
        corpus.join("property/lease.docx"),
        minimal_docx(&["Lease deed between the parties.", "Rent is due monthly."]),
    )
    .unwrap();
    fs::write(corpus.join("labour/broken.pdf"), b"not a pdf at all").unwrap();
    fs::write(corpus.join("labour/.hidden.txt"), "ignored").unwrap();

    let config = format!(
        r#"[db]
path = "{root}/data/index.sqlite"

[server]
bind = "127.0.0.1:7342"

[corpus]
root = "{root}/corpus"
max_file_bytes = {max}
"#,
        root = root.display(),
        max = max_file_bytes
    );
    let config_path = root.join("config/lexassist.toml");
    fs::write(&config_path, config).unwrap();
    (tmp, config_path)
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(lexassist_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_pdf_and_docx_indexed_broken_skipped() {
    let (_tmp, config_path) = setup(50 * 1024 * 1024);

    let (stdout, stderr, success) = run(&config_path, &["index", "build"]);
    assert!(success, "index build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("scanned: 2 files"), "stdout={}", stdout);
    assert!(stdout.contains("upserted documents: 2"));

    let (stdout, _, success) = run(&config_path, &["index", "sources"]);
    assert!(success);
    let pdf = stdout.lines().find(|l| l.starts_with("wages_1936.pdf")).unwrap();
    assert!(pdf.contains("labour"));
    let docx = stdout.lines().find(|l| l.starts_with("lease.docx")).unwrap();
    assert!(docx.contains("property"));
    assert!(!stdout.contains("broken.pdf"));
    assert!(!stdout.contains(".hidden.txt"));
}

#[test]
fn test_max_file_bytes_skips_large_files() {
    let (_tmp, config_path) = setup(100);

    let (stdout, stderr, success) = run(&config_path, &["index", "build"]);
    assert!(success, "index build failed: {}", stderr);
    // Only the broken PDF is under 100 bytes, and it fails extraction.
    assert!(stdout.contains("scanned: 0 files"), "stdout={}", stdout);
}
