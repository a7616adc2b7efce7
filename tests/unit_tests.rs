use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use thumbview::{
    describe, display_size, human_size, is_image_file, relay_completions, relocate, render_thumbnail, resolve_start,
    scan_folder, thumbnail_height, Args, CompletionQueue, Direction, PlaceholderBoard, RenderFailure, RenderMessage,
    RenderPool, ThumbnailJob, ThumbnailRecord, ThumbviewError, ViewerConfig, Workspace,
};

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
        .save(path)
        .unwrap();
}

fn record(source: &Path, thumbnail: &Path) -> ThumbnailRecord {
    ThumbnailRecord {
        source: source.to_path_buf(),
        thumbnail: thumbnail.to_path_buf(),
    }
}

#[cfg(test)]
mod cli_args_tests {
    use super::*;

    #[test]
    fn test_args_default_values() {
        let args = Args::try_parse_from(["thumbview"]).unwrap();

        assert_eq!(args.path, PathBuf::from("."));
        assert_eq!(args.thumbnail_width, 250);
        assert_eq!(args.workers, None);
        assert!(!args.debug);
        assert!(!args.check);
        assert_eq!(args.sort_to, None);
        assert!(!args.copy_on_sort);
    }

    #[test]
    fn test_args_custom_values() {
        let args = Args::try_parse_from([
            "thumbview",
            "/home/user/pictures/cat.png",
            "--thumbnail-width", "120",
            "--workers", "3",
            "--debug",
            "--check",
        ])
        .unwrap();

        assert_eq!(args.path, PathBuf::from("/home/user/pictures/cat.png"));
        assert_eq!(args.thumbnail_width, 120);
        assert_eq!(args.workers, Some(3));
        assert!(args.debug);
        assert!(args.check);
    }

    #[test]
    fn test_args_short_flags() {
        let args = Args::try_parse_from(["thumbview", "-t", "64", "-w", "1"]).unwrap();

        assert_eq!(args.thumbnail_width, 64);
        assert_eq!(args.workers, Some(1));
    }

    #[test]
    fn test_args_sort_options_reach_config() {
        let args = Args::try_parse_from(["thumbview", "--sort-to", "/home/user/keep", "--copy-on-sort"]).unwrap();
        let config = ViewerConfig::from_args(&args).unwrap();

        assert_eq!(config.sort_folder, Some(PathBuf::from("/home/user/keep")));
        assert!(config.copy_on_sort);
    }

    #[test]
    fn test_args_invalid_thumbnail_width() {
        let result = Args::try_parse_from(["thumbview", "--thumbnail-width", "wide"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::try_parse_from(["thumbview", "-t", "300", "-w", "0"]).unwrap();
        let config = ViewerConfig::from_args(&args).unwrap();

        assert_eq!(config.thumbnail_width, 300);
        assert_eq!(config.workers, 1);
        assert!((config.scale_step - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_rejects_zero_width() {
        let args = Args::try_parse_from(["thumbview", "-t", "0"]).unwrap();

        assert!(matches!(
            ViewerConfig::from_args(&args),
            Err(ThumbviewError::InvalidThumbnailWidth(0))
        ));
    }

    #[test]
    fn test_resolve_start() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("start.png");
        write_png(&image, 4, 4);
        let folder = fs::canonicalize(temp_dir.path()).unwrap();

        let (dir, file) = resolve_start(&image).unwrap();
        assert_eq!(dir, folder);
        assert_eq!(file, Some(folder.join("start.png")));

        let (dir, file) = resolve_start(temp_dir.path()).unwrap();
        assert_eq!(dir, folder);
        assert_eq!(file, None);

        assert!(matches!(
            resolve_start(&temp_dir.path().join("missing.png")),
            Err(ThumbviewError::InvalidStartPath(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_start_keeps_symlink_name() {
        let temp_dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        write_png(&elsewhere.path().join("target.png"), 4, 4);
        std::os::unix::fs::symlink(elsewhere.path().join("target.png"), temp_dir.path().join("link.png")).unwrap();
        let folder = fs::canonicalize(temp_dir.path()).unwrap();

        let (dir, file) = resolve_start(&temp_dir.path().join("link.png")).unwrap();

        assert_eq!(dir, folder);
        assert_eq!(file, Some(folder.join("link.png")));
    }
}

#[cfg(test)]
mod scanner_tests {
    use super::*;

    #[test]
    fn test_is_image_file_valid_extensions() {
        let test_cases = vec![
            "image.jpg", "image.jpeg", "image.png", "image.gif", "image.bmp", "image.pbm", "image.pgm",
            "image.ppm", "IMAGE.JPG", "Image.Png",
        ];

        for filename in test_cases {
            assert!(is_image_file(&PathBuf::from(filename)), "Failed for {}", filename);
        }
    }

    #[test]
    fn test_is_image_file_invalid_extensions() {
        let test_cases = vec!["document.txt", "video.mp4", "archive.zip", "no_extension", "image.", "png"];

        for filename in test_cases {
            assert!(!is_image_file(&PathBuf::from(filename)), "Failed for {}", filename);
        }
    }

    #[test]
    fn test_scan_filters_sorts_and_skips_subfolders() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::write(base.join("c.gif"), b"not really a gif").unwrap();
        fs::write(base.join("a.PNG"), b"png").unwrap();
        fs::write(base.join("b.jpg"), b"jpg").unwrap();
        fs::write(base.join("notes.txt"), b"text").unwrap();
        fs::create_dir(base.join("nested")).unwrap();
        fs::write(base.join("nested").join("deep.png"), b"png").unwrap();

        let files = scan_folder(base).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.PNG", "b.jpg", "c.gif"]);
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_collapses_symlinks_to_one_entry() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::write(base.join("real.png"), b"png").unwrap();
        std::os::unix::fs::symlink(base.join("real.png"), base.join("alias.png")).unwrap();

        let files = scan_folder(base).unwrap();

        assert_eq!(files, vec![fs::canonicalize(base.join("real.png")).unwrap()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_keeps_symlinked_sibling_under_its_own_name() {
        let temp_dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let base = temp_dir.path();
        write_png(&base.join("x.png"), 100, 50);
        write_png(&other.path().join("x.png"), 50, 300);
        std::os::unix::fs::symlink(other.path().join("x.png"), base.join("y.png")).unwrap();
        let folder = fs::canonicalize(base).unwrap();

        let files = scan_folder(base).unwrap();

        assert_eq!(files, vec![folder.join("x.png"), folder.join("y.png")]);
    }

    #[test]
    fn test_scan_missing_folder_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan_folder(&temp_dir.path().join("gone"));

        assert!(matches!(result, Err(ThumbviewError::FolderScan { .. })));
    }
}

#[cfg(test)]
mod render_tests {
    use super::*;

    #[test]
    fn test_thumbnail_height_is_width_anchored() {
        assert_eq!(thumbnail_height(100, 50, 250), 125);
        assert_eq!(thumbnail_height(200, 200, 250), 250);
        assert_eq!(thumbnail_height(50, 300, 250), 1500);
        assert_eq!(thumbnail_height(3, 1, 1), 1);
        assert_eq!(thumbnail_height(0, 10, 10), 1);
    }

    #[test]
    fn test_render_scales_to_target_width() {
        let source_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let source = source_dir.path().join("wide.png");
        write_png(&source, 400, 100);

        let job = ThumbnailJob {
            source: source.clone(),
            target_width: 120,
        };
        let record = render_thumbnail(&job, dest_dir.path()).unwrap();

        assert_eq!(record.source, source);
        assert_eq!(record.thumbnail, dest_dir.path().join("wide.png"));
        assert_eq!(image::image_dimensions(&record.thumbnail).unwrap(), (120, 30));
    }

    #[test]
    fn test_render_every_supported_encoding() {
        let source_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();

        for ext in ["jpg", "jpeg", "gif", "bmp", "ppm", "png"] {
            let source = source_dir.path().join(format!("sample.{}", ext));
            write_png(&source, 120, 40);

            let job = ThumbnailJob {
                source: source.clone(),
                target_width: 60,
            };
            let record = render_thumbnail(&job, dest_dir.path()).unwrap_or_else(|e| panic!("{}: {}", ext, e));

            assert_eq!(record.thumbnail, dest_dir.path().join(format!("sample.{}", ext)));
            assert_eq!(image::image_dimensions(&record.thumbnail).unwrap(), (60, 20), "Failed for {}", ext);
            let written = image::io::Reader::open(&record.thumbnail)
                .unwrap()
                .with_guessed_format()
                .unwrap()
                .format();
            assert_eq!(written, image::ImageFormat::from_extension(ext), "Failed for {}", ext);
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let source_dir = TempDir::new().unwrap();
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let source = source_dir.path().join("photo.png");
        write_png(&source, 321, 123);
        let job = ThumbnailJob {
            source,
            target_width: 77,
        };

        let a = render_thumbnail(&job, first.path()).unwrap();
        let b = render_thumbnail(&job, second.path()).unwrap();

        assert_eq!(fs::read(a.thumbnail).unwrap(), fs::read(b.thumbnail).unwrap());
    }

    #[test]
    fn test_render_reports_corrupt_image() {
        let source_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let source = source_dir.path().join("broken.png");
        fs::write(&source, b"\x89PNG\r\n\x1a\n garbage").unwrap();

        let job = ThumbnailJob {
            source,
            target_width: 100,
        };

        assert!(matches!(
            render_thumbnail(&job, dest_dir.path()),
            Err(RenderFailure::Decode { .. })
        ));
        assert_eq!(fs::read_dir(dest_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_render_reports_missing_source() {
        let dest_dir = TempDir::new().unwrap();
        let job = ThumbnailJob {
            source: dest_dir.path().join("nowhere.png"),
            target_width: 100,
        };

        assert!(matches!(
            render_thumbnail(&job, dest_dir.path()),
            Err(RenderFailure::Io { .. })
        ));
    }

    #[test]
    fn test_pool_emits_records_then_completion() {
        let source_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for i in 0..6 {
            let path = source_dir.path().join(format!("img{}.png", i));
            write_png(&path, 20 + i, 10);
            files.push(path);
        }
        let broken = source_dir.path().join("zz.png");
        fs::write(&broken, b"nope").unwrap();
        files.push(broken);

        let pool = RenderPool::new(3).unwrap();
        let (sender, receiver) = mpsc::channel();
        let rendered = pool.run(&ThumbnailJob::batch(&files, 10), dest_dir.path(), &sender, || true);
        drop(sender);

        let messages: Vec<RenderMessage> = receiver.iter().collect();
        assert_eq!(rendered, 6);
        assert_eq!(messages.len(), 7);
        assert!(matches!(messages.last(), Some(RenderMessage::BatchComplete)));
        assert!(messages[..6]
            .iter()
            .all(|m| matches!(m, RenderMessage::Rendered(_))));
    }

    #[test]
    fn test_pool_skips_jobs_of_a_stale_batch() {
        let source_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let path = source_dir.path().join("img.png");
        write_png(&path, 8, 8);

        let pool = RenderPool::new(2).unwrap();
        let (sender, receiver) = mpsc::channel();
        let rendered = pool.run(&ThumbnailJob::batch(&[path], 4), dest_dir.path(), &sender, || false);
        drop(sender);

        assert_eq!(rendered, 0);
        let messages: Vec<RenderMessage> = receiver.iter().collect();
        assert!(matches!(messages.as_slice(), [RenderMessage::BatchComplete]));
    }
}

#[cfg(test)]
mod queue_tests {
    use super::*;

    #[test]
    fn test_pop_returns_none_once_drained_and_empty() {
        let queue = CompletionQueue::new();
        queue.push(record(Path::new("/a.png"), Path::new("/t/a.png")));
        queue.mark_drained();

        assert!(queue.is_drained());
        assert_eq!(queue.pop().unwrap().source, PathBuf::from("/a.png"));
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_waits_for_producer() {
        let queue = CompletionQueue::new();
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                queue.push(record(Path::new("/late.png"), Path::new("/t/late.png")));
                queue.mark_drained();
            })
        };

        let first = queue.pop();
        producer.join().unwrap();

        assert_eq!(first.unwrap().source, PathBuf::from("/late.png"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_relay_stops_at_batch_complete() {
        let queue = CompletionQueue::new();
        let (sender, receiver) = mpsc::channel();
        sender.send(RenderMessage::Rendered(record(Path::new("/a.png"), Path::new("/t/a.png")))).unwrap();
        sender.send(RenderMessage::Rendered(record(Path::new("/b.png"), Path::new("/t/b.png")))).unwrap();
        sender.send(RenderMessage::BatchComplete).unwrap();

        let relayed = relay_completions(receiver, &queue);

        assert_eq!(relayed, 2);
        assert_eq!(queue.len(), 2);
        assert!(queue.is_drained());
    }

    #[test]
    fn test_relay_treats_hangup_as_completion() {
        let queue = CompletionQueue::new();
        let (sender, receiver) = mpsc::channel::<RenderMessage>();
        drop(sender);

        assert_eq!(relay_completions(receiver, &queue), 0);
        assert!(queue.is_drained());
        assert!(queue.pop().is_none());
    }
}

#[cfg(test)]
mod board_tests {
    use super::*;

    fn board_with_thumbnail(width: u32, height: u32) -> (TempDir, PlaceholderBoard, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.png");
        let thumbnail = temp_dir.path().join("thumb.png");
        write_png(&thumbnail, width, height);
        let board = PlaceholderBoard::new(100);
        (temp_dir, board, source, thumbnail)
    }

    #[test]
    fn test_display_size_keeps_aspect_ratio() {
        assert_eq!(display_size(250, 125, 250), [250.0, 125.0]);
        assert_eq!(display_size(200, 400, 100), [100.0, 200.0]);
    }

    #[test]
    fn test_begin_batch_creates_one_empty_placeholder_per_file() {
        let board = PlaceholderBoard::new(100);
        let files = vec![PathBuf::from("/a.png"), PathBuf::from("/b.png"), PathBuf::from("/a.png")];

        let generation = board.begin_batch(files).unwrap();
        let placeholders = board.snapshot().unwrap();

        assert_eq!(generation, 1);
        assert_eq!(board.len().unwrap(), 2);
        assert!(!board.is_empty().unwrap());
        assert_eq!(placeholders.len(), 2);
        assert!(placeholders.iter().all(|p| !p.is_bound()));
    }

    #[test]
    fn test_bind_happens_once() {
        let (_dir, board, source, thumbnail) = board_with_thumbnail(100, 40);
        let generation = board.begin_batch(vec![source.clone()]).unwrap();

        assert!(board.bind(generation, &record(&source, &thumbnail)).unwrap());
        assert!(!board.bind(generation, &record(&source, &thumbnail)).unwrap());

        let placeholder = board.placeholder(&source).unwrap().unwrap();
        assert_eq!(placeholder.thumbnail, Some(thumbnail));
        assert_eq!(placeholder.thumbnail_size, Some([100, 40]));
        assert_eq!(placeholder.display_size, Some([100.0, 40.0]));
        assert_eq!(placeholder.revision, 1);
    }

    #[test]
    fn test_bind_ignores_stale_generation() {
        let (_dir, board, source, thumbnail) = board_with_thumbnail(10, 10);
        let old = board.begin_batch(vec![source.clone()]).unwrap();
        let new = board.begin_batch(vec![source.clone()]).unwrap();

        assert!(!board.is_current(old));
        assert!(board.is_current(new));
        assert!(!board.bind(old, &record(&source, &thumbnail)).unwrap());
        assert!(board.prune_unbound(old).unwrap().is_none());
        assert_eq!(board.len().unwrap(), 1);
    }

    #[test]
    fn test_bind_rejects_unreadable_thumbnail() {
        let (dir, board, source, _thumbnail) = board_with_thumbnail(10, 10);
        let generation = board.begin_batch(vec![source.clone()]).unwrap();
        let bogus = dir.path().join("bogus.png");
        fs::write(&bogus, b"not a png").unwrap();

        assert!(!board.bind(generation, &record(&source, &bogus)).unwrap());
    }

    #[test]
    fn test_prune_removes_unbound_placeholders_and_files() {
        let (_dir, board, source, thumbnail) = board_with_thumbnail(10, 10);
        let missing = PathBuf::from("/never/rendered.png");
        let generation = board.begin_batch(vec![missing.clone(), source.clone()]).unwrap();
        board.bind(generation, &record(&source, &thumbnail)).unwrap();

        let pruned = board.prune_unbound(generation).unwrap().unwrap();

        assert_eq!(pruned, vec![missing]);
        assert_eq!(board.files().unwrap(), vec![source]);
        assert_eq!(board.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_resizing_recomputes_display_sizes() {
        let (_dir, board, source, thumbnail) = board_with_thumbnail(100, 50);
        let generation = board.begin_batch(vec![source.clone()]).unwrap();
        board.bind(generation, &record(&source, &thumbnail)).unwrap();

        board.set_thumbnail_width(40).unwrap();
        assert_eq!(board.placeholder(&source).unwrap().unwrap().display_size, Some([40.0, 20.0]));

        board.scale_thumbnails(0.5).unwrap();
        assert_eq!(board.thumbnail_width().unwrap(), 50);
        assert_eq!(board.placeholder(&source).unwrap().unwrap().display_size, Some([50.0, 25.0]));
    }

    #[test]
    fn test_neighbor_clamps_at_the_ends() {
        let board = PlaceholderBoard::new(100);
        let files = vec![PathBuf::from("/a.png"), PathBuf::from("/b.png"), PathBuf::from("/c.png")];
        board.begin_batch(files.clone()).unwrap();

        assert_eq!(board.neighbor(&files[0], Direction::Next).unwrap(), Some(files[1].clone()));
        assert_eq!(board.neighbor(&files[2], Direction::Next).unwrap(), Some(files[2].clone()));
        assert_eq!(board.neighbor(&files[1], Direction::Previous).unwrap(), Some(files[0].clone()));
        assert_eq!(board.neighbor(&files[0], Direction::Previous).unwrap(), Some(files[0].clone()));
        assert_eq!(
            board.neighbor(Path::new("/elsewhere.png"), Direction::Next).unwrap(),
            Some(files[0].clone())
        );
    }

    #[test]
    fn test_remove_drops_file_and_placeholder() {
        let board = PlaceholderBoard::new(100);
        board
            .begin_batch(vec![PathBuf::from("/a.png"), PathBuf::from("/b.png")])
            .unwrap();

        let removed = board.remove(Path::new("/a.png")).unwrap();

        assert_eq!(removed.unwrap().source, PathBuf::from("/a.png"));
        assert_eq!(board.files().unwrap(), vec![PathBuf::from("/b.png")]);
        assert!(board.remove(Path::new("/a.png")).unwrap().is_none());
    }
}

#[cfg(test)]
mod utility_tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(2 * 1024 * 1024), "2.0 MiB");
    }

    #[test]
    fn test_describe_reports_dimensions_and_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("info.png");
        write_png(&path, 30, 20);

        let details = describe(&path).unwrap();

        assert_eq!(details.name, "info.png");
        assert_eq!((details.width, details.height), (30, 20));
        assert_eq!(details.bytes, fs::metadata(&path).unwrap().len());
        assert!(details.to_string().starts_with("info.png: 30x20, "));
    }

    #[test]
    fn test_relocate_moves_or_copies() {
        let source_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let moved = source_dir.path().join("moved.png");
        let copied = source_dir.path().join("copied.png");
        write_png(&moved, 6, 4);
        write_png(&copied, 4, 6);
        let dest_folder = fs::canonicalize(dest_dir.path()).unwrap();

        let moved_to = relocate(&moved, dest_dir.path(), false).unwrap();
        let copied_to = relocate(&copied, dest_dir.path(), true).unwrap();

        assert_eq!(moved_to, dest_folder.join("moved.png"));
        assert!(!moved.exists());
        assert_eq!(image::image_dimensions(&moved_to).unwrap(), (6, 4));
        assert_eq!(copied_to, dest_folder.join("copied.png"));
        assert!(copied.exists());
        assert_eq!(fs::read(&copied).unwrap(), fs::read(&copied_to).unwrap());
    }

    #[test]
    fn test_relocate_into_own_folder_leaves_file_alone() {
        let temp_dir = TempDir::new().unwrap();
        let folder = fs::canonicalize(temp_dir.path()).unwrap();
        let source = folder.join("stay.png");
        write_png(&source, 5, 5);
        let before = fs::read(&source).unwrap();

        assert_eq!(relocate(&source, &folder, true).unwrap(), source);
        assert_eq!(relocate(&source, &folder, false).unwrap(), source);
        assert_eq!(fs::read(&source).unwrap(), before);
    }

    #[test]
    fn test_relocate_into_missing_folder_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("orphan.png");
        write_png(&source, 2, 2);

        assert!(matches!(
            relocate(&source, &temp_dir.path().join("nope"), false),
            Err(ThumbviewError::FileAccess { .. })
        ));
        assert!(source.exists());
    }

    #[test]
    fn test_workspace_recreate_and_drop() {
        let base = TempDir::new().unwrap();
        let mut workspace = Workspace::in_dir(base.path()).unwrap();
        let first = workspace.path().unwrap().to_path_buf();
        fs::write(first.join("thumb.png"), b"x").unwrap();

        let second = workspace.recreate().unwrap().to_path_buf();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.is_dir());
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("thumbview."));

        drop(workspace);
        assert!(!second.exists());
    }

    #[test]
    fn test_workspace_purge() {
        let base = TempDir::new().unwrap();
        let mut workspace = Workspace::in_dir(base.path()).unwrap();
        let dir = workspace.path().unwrap().to_path_buf();

        workspace.purge().unwrap();

        assert!(workspace.path().is_none());
        assert!(!dir.exists());
    }
}
