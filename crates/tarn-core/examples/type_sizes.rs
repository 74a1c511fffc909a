// Prints the in-memory size of the hot value types; the interpreter keeps
// `Value` on its operand stack, so its size bounds stack memory per slot.
use std::mem::size_of;

fn main() {
    println!("=== Value Model ===");
    println!("Value: {} bytes", size_of::<tarn_core::Value>());
    println!("ValueType: {} bytes", size_of::<tarn_core::ValueType>());
    println!("FuncRef: {} bytes", size_of::<tarn_core::FuncRef>());
    println!("FuncType: {} bytes", size_of::<tarn_core::FuncType>());
    println!("Limits: {} bytes", size_of::<tarn_core::Limits>());

    println!("\n=== Errors ===");
    println!("Status: {} bytes", size_of::<tarn_core::Status>());
    println!("Error: {} bytes", size_of::<tarn_core::Error>());
    println!("Result<()>: {} bytes", size_of::<tarn_core::Result<()>>());

    println!("\n=== Config ===");
    println!("EngineConfig: {} bytes", size_of::<tarn_core::EngineConfig>());
}
