#[cfg(feature = "shaderc")]
extern crate shaderc;

#[allow(unused_imports)]
use std::fs::File;
#[allow(unused_imports)]
use std::io::{Read, Write};
#[allow(unused_imports)]
use std::path::Path;

#[cfg(feature = "shaderc")]
use shaderc::{CompileOptions, EnvVersion, SpirvVersion, TargetEnv};

#[cfg(feature = "shaderc")]
fn load_file(path: &Path) -> String {
    let mut out = String::new();
    File::open(path).unwrap().read_to_string(&mut out).unwrap();
    out
}

#[cfg(feature = "shaderc")]
fn save_file(path: &Path, binary: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().write_all(binary).unwrap();
}

#[cfg(feature = "shaderc")]
fn compile_shader(path: &Path, kind: shaderc::ShaderKind, output: &Path) {
    let compiler = shaderc::Compiler::new().unwrap();
    let mut options = CompileOptions::new().unwrap();
    options.set_target_env(TargetEnv::Vulkan, EnvVersion::Vulkan1_2 as u32);
    // Ray tracing stages need SPIR-V 1.4
    options.set_target_spirv(SpirvVersion::V1_4);
    let binary = compiler
        .compile_into_spirv(&load_file(path), kind, path.as_os_str().to_str().unwrap(), "main", Some(&options))
        .unwrap();
    save_file(output, binary.as_binary_u8());
}

#[cfg(feature = "shaderc")]
fn compile_shaders() {
    println!("cargo:rerun-if-changed=shaders/raygen.rgen");
    println!("cargo:rerun-if-changed=shaders/miss.rmiss");
    println!("cargo:rerun-if-changed=shaders/closesthit.rchit");

    compile_shader(
        Path::new("shaders/raygen.rgen"),
        shaderc::ShaderKind::RayGeneration,
        Path::new("shaders/spv/raygen.rgen.spv"),
    );
    compile_shader(
        Path::new("shaders/miss.rmiss"),
        shaderc::ShaderKind::Miss,
        Path::new("shaders/spv/miss.rmiss.spv"),
    );
    compile_shader(
        Path::new("shaders/closesthit.rchit"),
        shaderc::ShaderKind::ClosestHit,
        Path::new("shaders/spv/closesthit.rchit.spv"),
    );
}

fn main() {
    #[cfg(feature = "shaderc")]
    compile_shaders();
}
