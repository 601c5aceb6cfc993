use vergen_gitcl::{Cargo, Emitter, Gitcl};

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let cargo = Cargo::all_cargo();
	let gitcl = Gitcl::all_git();

	Emitter::default().add_instructions(&cargo)?.add_instructions(&gitcl)?.emit()?;

	Ok(())
}
