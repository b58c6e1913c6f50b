//! End-to-end runs of the bundle pipeline against a fake container tree.

mod common;

use bundle_gen::bundler::Error;
use bundle_gen::bundler::assemble::BundleMetadata;
use common::{TestEnv, entries, libs, read_entry};
use std::collections::BTreeSet;

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn web_game_ships_only_resources() {
    let env = TestEnv::new(&["libc.so.6"]);
    env.file(&env.source, "VERSION", "3\n");
    env.file(&env.source, "index.html", "<html></html>");
    let spec = env.spec(
        "web",
        "Name: Web Thing\nType: Game\nStoreID: web-thing\nExec: index.html\nLauncher: chrome\n\
         Build:\n  VersionFile: VERSION\n  Resources: [index.html]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    assert_eq!(artifact.path, env.build.join("web_3.bundle"));
    assert_eq!(
        entries(&artifact.path),
        set(&["bundle.ini", "res/", "res/index.html"])
    );

    let meta = BundleMetadata::from_archive(&artifact.path).unwrap();
    assert_eq!(meta.exec.as_deref(), Some("index.html"));
    assert_eq!(meta.launcher.as_deref(), Some("chrome"));
    assert_eq!(meta.version, "3");
}

#[tokio::test]
async fn shared_dependency_is_bundled_once() {
    let env = TestEnv::new(&["libc.so.6"]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "out/a", &["libfoo.so", "libc.so.6"]);
    env.elf(&env.build, "out/b", &["libfoo.so"]);
    env.system_lib("libfoo.so", &["libc.so.6"]);
    let spec = env.spec(
        "pair",
        "Name: Pair\nType: Application\nHomebrewID: pair\nExec: bin/a\n\
         Build:\n  VersionFile: VERSION\n  Executables: [out/a, out/b]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    let names = entries(&artifact.path);
    for expected in ["bin/a", "bin/b", "lib/libfoo.so", "run.sh", "bundle.ini"] {
        assert!(names.contains(expected), "missing {expected} in {names:?}");
    }
    assert_eq!(libs(&artifact.path), set(&["lib/libfoo.so"]));

    let run = String::from_utf8(read_entry(&artifact.path, "run.sh")).unwrap();
    assert!(run.contains(r#""${P}/bin/a" "$@""#));
}

#[tokio::test]
async fn declared_library_also_found_transitively_is_one_copy() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "game", &["libfoo.so"]);
    env.system_lib("libfoo.so", &["libbar.so"]);
    let libbar = env.system_lib("libbar.so", &[]);
    let spec = env.spec(
        "game",
        &format!(
            "Name: Game\nType: Game\nStoreID: game\nExec: bin/game\n\
             Build:\n  VersionFile: VERSION\n  Executables: [game]\n  Libraries: [{}]\n",
            libbar.display()
        ),
    );

    let artifact = env.bundle(&spec).await.unwrap();
    assert_eq!(
        libs(&artifact.path),
        set(&["lib/libbar.so", "lib/libfoo.so"])
    );
    assert_eq!(
        read_entry(&artifact.path, "lib/libbar.so"),
        std::fs::read(&libbar).unwrap()
    );
}

#[tokio::test]
async fn declared_library_conflicting_with_dependency_fails() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "game", &["libbar.so"]);
    env.system_lib("libbar.so", &[]);
    env.file(&env.build, "out/libbar.so", "a different libbar");
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: bin/game\n\
         Build:\n  VersionFile: VERSION\n  Executables: [game]\n  Libraries: [out/libbar.so]\n",
    );

    let err = env.bundle(&spec).await.unwrap_err();
    assert!(matches!(err, Error::LibraryNameCollision(ref name) if name == "libbar.so"), "{err}");
    assert!(env.archives().is_empty());
}

#[tokio::test]
async fn declared_library_is_found_by_its_link_name() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "game", &["libbar.so.1"]);
    let libbar = env.elf(&env.build, "out/libbar.so.1.0", &[]);
    env.symlink(&env.build, "out/libbar.so.1", "libbar.so.1.0");
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: bin/game\n\
         Build:\n  VersionFile: VERSION\n  Executables: [game]\n  Libraries: [out/libbar.so.1.0]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    assert_eq!(
        libs(&artifact.path),
        set(&["lib/libbar.so.1", "lib/libbar.so.1.0"])
    );
    assert_eq!(
        read_entry(&artifact.path, "lib/libbar.so.1"),
        std::fs::read(&libbar).unwrap()
    );
}

#[tokio::test]
async fn failing_module_aborts_before_build_command() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.script("modules/fail.sh", "echo broken; exit 1");
    env.script("build.sh", "touch built");
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: game\n\
         Build:\n  VersionFile: VERSION\n  RequiredModules: [modules/fail.sh]\n  BuildCommand: build.sh\n",
    );

    let err = env.bundle(&spec).await.unwrap_err();
    match &err {
        Error::ModuleFailed { path, code } => {
            assert!(path.ends_with("modules/fail.sh"));
            assert_eq!(*code, Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("modules/fail.sh"));
    assert!(!env.build.join("built").exists());
    assert!(!env.calls().contains(&"ldconfig".to_string()));
    assert!(env.archives().is_empty());

    let log = std::fs::read_to_string(env.build.join("game.log")).unwrap();
    assert!(log.contains("broken"));
}

#[tokio::test]
async fn full_build_runs_steps_in_order_and_trims_version() {
    let env = TestEnv::new(&["libc.so.6"]);
    env.script("modules/sdl.sh", "echo module >> steps.txt");
    env.script(
        "build.sh",
        "echo build >> steps.txt\nmkdir -p out\nprintf '  1.2.0\\n' > VERSION",
    );
    env.elf(&env.build, "out/game", &["libc.so.6"]);
    let spec = env.spec(
        "pong",
        "Name: Pong\nType: Game\nStoreID: pong\nExec: bin/game\n\
         Build:\n  VersionFile: VERSION\n  RequiredPackages: [libsdl2-dev, zlib1g]\n\
         \x20 RequiredModules: [modules/sdl.sh]\n  BuildCommand: build.sh\n  Executables: [out/game]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    assert_eq!(artifact.path, env.build.join("pong_1.2.0.bundle"));
    assert_eq!(artifact.version, "1.2.0");
    assert_eq!(artifact.size, std::fs::metadata(&artifact.path).unwrap().len());
    assert_eq!(artifact.checksum.len(), 64);

    assert_eq!(
        env.calls(),
        ["apt-get install -y libsdl2-dev zlib1g", "ldconfig"]
    );
    assert_eq!(
        std::fs::read_to_string(env.build.join("steps.txt")).unwrap(),
        "module\nbuild\n"
    );
    assert_eq!(
        BundleMetadata::from_archive(&artifact.path).unwrap().version,
        "1.2.0"
    );
}

#[tokio::test]
async fn bin_holds_exactly_the_declared_executables() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "out/server", &[]);
    env.elf(&env.build, "out/client", &[]);
    env.elf(&env.build, "out/plugin.so", &[]);
    let spec = env.spec(
        "tools",
        "Name: Tools\nType: Application\nStoreID: tools\nExec: bin/client\n\
         Build:\n  VersionFile: VERSION\n  Executables: [out/server, out/client]\n\
         \x20 ExtraElfFiles: [out/plugin.so]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    let bin: BTreeSet<String> = entries(&artifact.path)
        .into_iter()
        .filter(|name| name.starts_with("bin/") && name != "bin/")
        .collect();
    assert_eq!(bin, set(&["bin/client", "bin/server"]));
}

#[tokio::test]
async fn base_libraries_and_their_dependencies_are_excluded() {
    let env = TestEnv::new(&["libc.so.6", "libbase.so"]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "game", &["libbase.so", "libc.so.6", "libextra.so"]);
    env.system_lib("libbase.so", &["libhidden.so"]);
    env.system_lib("libhidden.so", &[]);
    env.system_lib("libextra.so", &["libc.so.6"]);
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: bin/game\n\
         Build:\n  VersionFile: VERSION\n  Executables: [game]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    assert_eq!(libs(&artifact.path), set(&["lib/libextra.so"]));
}

#[tokio::test]
async fn aliases_of_one_file_are_bundled_once() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "a", &["libfoo.so.1"]);
    env.elf(&env.build, "b", &["libfoo.so.1.2"]);
    env.system_lib("libfoo.so.1.2", &[]);
    env.symlink(&env.sysroot, "usr/lib/libfoo.so.1", "libfoo.so.1.2");
    let spec = env.spec(
        "pair",
        "Name: Pair\nType: Game\nStoreID: pair\nExec: bin/a\n\
         Build:\n  VersionFile: VERSION\n  Executables: [a, b]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    assert_eq!(libs(&artifact.path), set(&["lib/libfoo.so.1"]));
}

#[tokio::test]
async fn origin_relative_runpath_is_followed() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf_with_runpath(&env.build, "out/game", &["libown.so"], Some("$ORIGIN/../libs"));
    env.elf(&env.build, "libs/libown.so", &[]);
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: bin/game\n\
         Build:\n  VersionFile: VERSION\n  Executables: [out/game]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    assert_eq!(libs(&artifact.path), set(&["lib/libown.so"]));
}

#[tokio::test]
async fn resource_trailing_separator_copies_contents() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.file(&env.source, "assets/a.txt", "a");
    env.file(&env.source, "assets/sub/b.txt", "b");
    env.file(&env.source, "data/c.txt", "c");
    let spec = env.spec(
        "res",
        "Name: Res\nType: Game\nStoreID: res\nExec: res/a.txt\nLauncher: viewer\n\
         Build:\n  VersionFile: VERSION\n  Resources: [assets/, data]\n",
    );

    let artifact = env.bundle(&spec).await.unwrap();
    let names = entries(&artifact.path);
    for expected in ["res/a.txt", "res/sub/b.txt", "res/data/c.txt"] {
        assert!(names.contains(expected), "missing {expected} in {names:?}");
    }
    assert!(!names.iter().any(|name| name.starts_with("res/assets")));
}

#[tokio::test]
async fn resources_writing_one_path_collide() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.file(&env.source, "a/x.txt", "from a");
    env.file(&env.source, "b/x.txt", "from b");
    let spec = env.spec(
        "res",
        "Name: Res\nType: Game\nStoreID: res\nExec: res/x.txt\nLauncher: viewer\n\
         Build:\n  VersionFile: VERSION\n  Resources: [a/, b/]\n",
    );

    let err = env.bundle(&spec).await.unwrap_err();
    assert!(matches!(err, Error::DestinationCollision(ref dest) if dest == "res/x.txt"), "{err}");
    assert!(env.archives().is_empty());
}

#[tokio::test]
async fn executables_sharing_a_file_name_collide() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "server/game", &[]);
    env.file(&env.build, "client/game", "#!/bin/sh\nexit 0\n");
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: bin/game\n\
         Build:\n  VersionFile: VERSION\n  Executables: [server/game, client/game]\n",
    );

    let err = env.bundle(&spec).await.unwrap_err();
    assert!(matches!(err, Error::DestinationCollision(ref dest) if dest == "bin/game"), "{err}");
    assert!(env.archives().is_empty());
}

#[tokio::test]
async fn same_inputs_give_identical_archives() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "game", &["libfoo.so"]);
    env.system_lib("libfoo.so", &[]);
    env.file(&env.source, "assets/level.dat", "level");
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: bin/game\n\
         Build:\n  VersionFile: VERSION\n  Executables: [game]\n  Resources: [assets/]\n",
    );

    let first = env.bundle(&spec).await.unwrap();
    let first_bytes = std::fs::read(&first.path).unwrap();
    let second = env.bundle(&spec).await.unwrap();

    assert_eq!(first.path, second.path);
    assert_eq!(first.checksum, second.checksum);
    assert_eq!(first_bytes, std::fs::read(&second.path).unwrap());
}

#[tokio::test]
async fn unresolved_library_leaves_no_archive() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    env.elf(&env.build, "game", &["libmissing.so.3"]);
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: bin/game\n\
         Build:\n  VersionFile: VERSION\n  Executables: [game]\n",
    );

    let err = env.bundle(&spec).await.unwrap_err();
    assert!(matches!(err, Error::UnresolvedLibrary { ref name, .. } if name == "libmissing.so.3"));
    assert!(env.archives().is_empty());
}

#[tokio::test]
async fn missing_base_index_is_reported() {
    let env = TestEnv::new(&[]);
    env.file(&env.source, "VERSION", "1\n");
    std::fs::remove_file(&env.base_index).unwrap();
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: run\nLauncher: sh\n\
         Build:\n  VersionFile: VERSION\n",
    );

    let err = env.bundle(&spec).await.unwrap_err();
    assert!(matches!(err, Error::BaseIndexUnavailable { .. }), "{err}");
}

#[tokio::test]
async fn invalid_spec_runs_nothing() {
    let env = TestEnv::new(&[]);
    env.script("build.sh", "touch built");
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: a\nHomebrewID: b\nExec: game\n\
         Build:\n  VersionFile: VERSION\n  BuildCommand: build.sh\n",
    );

    let err = env.bundle(&spec).await.unwrap_err();
    assert!(matches!(err, Error::ConflictingOrigins));
    assert!(!env.build.join("built").exists());
}

#[tokio::test]
async fn missing_version_file_fails_after_build() {
    let env = TestEnv::new(&[]);
    env.script("build.sh", "touch built");
    let spec = env.spec(
        "game",
        "Name: Game\nType: Game\nStoreID: game\nExec: x\nLauncher: sh\n\
         Build:\n  VersionFile: VERSION\n  BuildCommand: build.sh\n",
    );

    let err = env.bundle(&spec).await.unwrap_err();
    assert!(matches!(err, Error::VersionFileMissing(_)), "{err}");
    assert!(env.build.join("built").exists());
}
