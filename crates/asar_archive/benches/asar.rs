use asar_archive::{Archive, AsarWriter, Flags};
use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

/// An application bundle with a few hundred scripts spread over nested directories
fn get_archive() -> Archive {
    let mut asar = AsarWriter::new(Vec::new());
    for module in 0..16 {
        asar.add_dir(format!("module_{module}"), Flags::NONE).unwrap();
        for file in 0..32 {
            let script =
                format!("mainWindow.show(); exports.value = {module} * {file};\n").repeat(64);
            asar.add_file(format!("file_{file}.js"), script, Flags::NONE)
                .unwrap();
        }
        asar.parent().unwrap();
    }
    asar.archive().clone()
}

fn get_input() -> Vec<u8> {
    get_archive().write(Vec::new()).unwrap()
}

pub mod read {
    use asar_archive::{read_header, Archive};
    use divan::Bencher;
    use std::io::Cursor;

    #[divan::bench]
    fn header(bencher: Bencher) {
        bencher.with_inputs(super::get_input).bench_refs(|data| {
            divan::black_box(read_header(&mut Cursor::new(data)).unwrap());
        });
    }

    #[divan::bench]
    fn archive(bencher: Bencher) {
        bencher.with_inputs(super::get_input).bench_refs(|data| {
            divan::black_box(Archive::read(Cursor::new(data)).unwrap());
        });
    }
}

pub mod write {
    use divan::Bencher;

    #[divan::bench]
    fn archive(bencher: Bencher) {
        bencher.with_inputs(super::get_archive).bench_refs(|archive| {
            divan::black_box(archive.write(Vec::new()).unwrap());
        });
    }
}

pub mod patch {
    use asar_archive::{Patch, Replacement};
    use divan::Bencher;

    #[divan::bench]
    fn apply(bencher: Bencher) {
        let patch = Patch::builder()
            .replacements(vec![Replacement::new("mainWindow.show();", "1+1;")])
            .build();

        bencher.with_inputs(super::get_archive).bench_refs(|archive| {
            divan::black_box(patch.apply(archive));
        });
    }
}
