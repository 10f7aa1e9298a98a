fn main() -> anyhow::Result<()> {
    moonvm_rust::run()
}
